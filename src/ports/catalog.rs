//! Abstract read/mutate interface over the ad store (spec §4.1). One
//! production adapter (Postgres) and one in-memory adapter (tests) implement
//! this trait; the engine depends only on the trait.

use crate::domain::ad::{Ad, Channel, Segment};
use crate::utils::errors::CatalogError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait CatalogPort: Send + Sync {
    /// Ads with `status=active`, `segment` in `ad.segments`, `channel` in
    /// `ad.channels`, and `ad.startDate <= now <= ad.endDate`, ordered by
    /// descending priority. Must fail with `CatalogError::Timeout` if it
    /// cannot complete within its soft ~2s deadline.
    async fn find_candidates(
        &self,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ad>, CatalogError>;

    async fn create_ad(&self, ad: Ad) -> Result<Ad, CatalogError>;

    /// Returns `Ok(true)` if `ad_id` existed and was incremented, `Ok(false)`
    /// if no such ad exists (SPEC_FULL §11: the `/ads/impression` route maps
    /// this to `404`).
    async fn increment_impressions(&self, ad_id: &str) -> Result<bool, CatalogError>;

    /// Returns `Ok(true)` if `ad_id` existed and was incremented, `Ok(false)`
    /// if no such ad exists (SPEC_FULL §11: the `/ads/click` route maps this
    /// to `404`).
    async fn increment_clicks(&self, ad_id: &str) -> Result<bool, CatalogError>;

    /// Used by the outer fallback path (§4.8): any single active ad matching
    /// `(segment, channel)`, highest priority first.
    async fn find_one(
        &self,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Option<Ad>, CatalogError>;

    /// Last observed connection state (spec §5's availability flag,
    /// SPEC_FULL §11's `catalogAvailable` health field). Reading never
    /// itself performs I/O.
    fn is_available(&self) -> bool {
        true
    }
}
