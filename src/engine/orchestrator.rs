//! Serving orchestrator (spec §4.8): composes rate limiting, validation,
//! cache, profile, catalog, filters and scoring into one `serve()` call, with
//! an outer fallback for anything that escapes the happy path.

use chrono::{DateTime, Utc};

use crate::config::settings::Settings;
use crate::domain::ad::{Ad, Channel, Segment};
use crate::domain::serve::{ServeRequest, ServeResponse};
use crate::engine::cache;
use crate::engine::filters::{frequency_cap_filter, time_slot_filter};
use crate::engine::profile_store::ProfileStore;
use crate::engine::scorer::score_and_rank;
use crate::ports::catalog::CatalogPort;
use crate::ports::kv::KvPort;
use crate::utils::errors::AppError;

const MAX_CUSTOMER_ID_LEN: usize = 64;

fn validated_customer_id(raw: &str) -> Result<&str, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("customerId is required".into()));
    }
    if trimmed.chars().count() > MAX_CUSTOMER_ID_LEN {
        return Err(AppError::Validation(format!(
            "customerId must be at most {MAX_CUSTOMER_ID_LEN} characters"
        )));
    }
    Ok(trimmed)
}

fn validated_balance(balance: f64) -> Result<f64, AppError> {
    if !balance.is_finite() || balance < 0.0 {
        return Err(AppError::Validation("balance must be a finite number >= 0".into()));
    }
    Ok(balance)
}

/// Unrecognised channel strings are accepted and simply yield no catalog
/// matches (spec §4.8 step 1) — they are not a validation error.
fn resolve_channel(raw: Option<&str>) -> (Channel, Option<String>) {
    match raw {
        None => (Channel::Atm, None),
        Some(s) => match Channel::parse(s) {
            Some(channel) => (channel, None),
            None => (Channel::Atm, Some(s.to_string())),
        },
    }
}

pub struct Orchestrator<'a> {
    pub catalog: &'a dyn CatalogPort,
    pub kv: &'a dyn KvPort,
    pub settings: &'a Settings,
}

impl<'a> Orchestrator<'a> {
    pub async fn serve(&self, req: &ServeRequest, now: DateTime<Utc>) -> Result<ServeResponse, AppError> {
        let customer_id = validated_customer_id(&req.customer_id)?.to_string();
        let balance = validated_balance(req.balance)?;
        let (channel, unrecognised) = resolve_channel(req.channel.as_deref());
        let segment = Segment::from_balance_with_thresholds(balance, &self.settings.segment_thresholds);

        if let Some(raw) = unrecognised {
            log::debug!("serve: unrecognised channel '{raw}', no candidates will match");
        }

        match self.serve_inner(&customer_id, segment, channel, now).await {
            Ok(response) => Ok(response),
            Err(AppError::NotFound) => Err(AppError::NotFound),
            Err(AppError::Validation(msg)) => Err(AppError::Validation(msg)),
            Err(_other) => self.outer_fallback(segment, channel, now).await,
        }
    }

    async fn serve_inner(
        &self,
        customer_id: &str,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<ServeResponse, AppError> {
        let key = cache::cache_key(segment, channel, customer_id);
        if self.kv.is_available() {
            if let Some(cached) = cache::lookup(self.kv, &key).await {
                return Ok(cached);
            }
        }

        let profile_store = ProfileStore::new(self.kv);
        let profile = profile_store.get(customer_id, now).await;

        let candidates = self
            .catalog
            .find_candidates(segment, channel, now)
            .await?;
        if candidates.is_empty() {
            return Err(AppError::NotFound);
        }

        let after_time_slot = time_slot_filter(candidates.clone(), now);
        let after_frequency = frequency_cap_filter(
            after_time_slot.eligible,
            &profile,
            &self.settings.frequency_cap,
            now,
        );

        for ex in after_frequency.excluded.iter().chain(after_time_slot.excluded.iter()) {
            log::debug!("serve: excluded {} ({})", ex.ad_id, ex.reason);
        }

        let (winner_ad, candidate_count): (Ad, usize) = if after_frequency.eligible.is_empty() {
            // Fallback-on-empty (spec §4.8 step 7): the least-shown ad from
            // the pre-filter set, bypassing time-slot and frequency caps, so
            // the system always returns something when the catalog has any
            // match at all. Candidate count after filters is 0 here (every
            // ad was filtered out), which per §4.6 means the thin-supply,
            // short cache TTL applies — the same forced repeat exposure the
            // adaptive TTL exists to limit.
            let winner = candidates
                .into_iter()
                .min_by_key(|ad| ad.impressions)
                .expect("pre-filter set is non-empty");
            (winner, 0)
        } else {
            let pool = after_frequency.eligible;
            let candidate_count = pool.len();
            let ranked = score_and_rank(
                &pool,
                &self.settings.score_weights,
                &self.settings.ctr,
                now,
                self.settings.recency_horizon_days,
            );
            let winner_id = ranked.first().expect("non-empty pool yields a ranked winner").ad.id.clone();
            let winner = pool.into_iter().find(|a| a.id == winner_id).expect("winner id came from this pool");
            (winner, candidate_count)
        };
        let winner = &winner_ad;

        let response = ServeResponse::from_ad(winner, segment, channel, false);

        // Spec §4.8 step 9/10 ("fire-and-forget") asks for detached tasks;
        // that needs 'static-owned ports (`Arc`), which this borrowed-port
        // orchestrator doesn't have — the HTTP layer (routes/serve.rs) holds
        // `Arc<dyn ...>` and does the actual `tokio::spawn` there. Here the
        // writes run inline so unit tests can assert their effects without
        // sleeping; either way failures are swallowed after logging and never
        // affect the response.
        profile_store.record_impression(customer_id, &winner.id, now).await;

        if self.kv.is_available() {
            let ttl = cache::adaptive_ttl(candidate_count, &self.settings.cache_ttls);
            cache::write(self.kv, &key, &response, ttl).await;
        }

        Ok(response)
    }

    /// Degraded path for any failure that escapes the happy path: one active
    /// ad for `(segment, channel)` by priority, flagged `fallback: true`.
    pub async fn outer_fallback(
        &self,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<ServeResponse, AppError> {
        match self.catalog.find_one(segment, channel, now).await {
            Ok(Some(ad)) => Ok(ServeResponse::from_ad(&ad, segment, channel, true)),
            Ok(None) => Err(AppError::Internal("Failed to serve ad".into())),
            Err(_) => Err(AppError::Internal("Failed to serve ad".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryCatalog, InMemoryKv};
    use crate::domain::ad::AdStatus;
    use chrono::Duration;

    fn make_ad(id: &str, priority: f64, impressions: u64, clicks: u64, now: DateTime<Utc>) -> Ad {
        Ad {
            id: id.into(),
            title: format!("ad-{id}"),
            image_url: "i".into(),
            video_url: None,
            cta: None,
            segments: vec![Segment::Mass],
            channels: vec![Channel::Atm],
            locations: None,
            time_slots: None,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(10),
            status: AdStatus::Active,
            priority,
            impressions,
            clicks,
            advertiser: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(customer_id: &str, balance: f64) -> ServeRequest {
        ServeRequest {
            balance,
            channel: Some("ATM".into()),
            customer_id: customer_id.into(),
        }
    }

    #[tokio::test]
    async fn basic_serve_picks_the_only_eligible_ad() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        catalog.seed(vec![make_ad("A", 5.0, 0, 0, now)]);
        let kv = InMemoryKv::new();
        let settings = Settings::default_for_tests();
        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };

        let response = orchestrator.serve(&request("C1", 120_000.0), now).await.unwrap();
        assert_eq!(response.ad_id, "A");
        assert_eq!(response.segment, Segment::Mass);
        assert!(response.fallback.is_none());
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_the_pipeline() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        let kv = InMemoryKv::new();
        let settings = Settings::default_for_tests();

        let canned = ServeResponse::from_ad(&make_ad("Z", 1.0, 0, 0, now), Segment::Mass, Channel::Atm, false);
        let key = cache::cache_key(Segment::Mass, Channel::Atm, "C1");
        cache::write(&kv, &key, &canned, 30).await;

        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };
        let response = orchestrator.serve(&request("C1", 120_000.0), now).await.unwrap();
        assert_eq!(response.ad_id, "Z");
    }

    #[tokio::test]
    async fn frequency_capped_ad_loses_to_an_uncapped_one() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        catalog.seed(vec![make_ad("A", 1.0, 0, 0, now), make_ad("B", 1.0, 100, 10, now)]);
        let kv = InMemoryKv::new();
        let settings = Settings::default_for_tests();

        let store = ProfileStore::new(&kv);
        for _ in 0..3 {
            store.record_impression("C1", "A", now - Duration::hours(1)).await;
        }

        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };
        let response = orchestrator.serve(&request("C1", 120_000.0), now).await.unwrap();
        assert_eq!(response.ad_id, "B");
    }

    #[tokio::test]
    async fn empty_catalog_returns_not_found() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        let kv = InMemoryKv::new();
        let settings = Settings::default_for_tests();
        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };

        let err = orchestrator.serve(&request("C1", 120_000.0), now).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn blank_customer_id_is_rejected() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        let kv = InMemoryKv::new();
        let settings = Settings::default_for_tests();
        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };

        let err = orchestrator.serve(&request("   ", 120_000.0), now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn kv_unavailable_still_serves_from_catalog() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        catalog.seed(vec![make_ad("A", 1.0, 0, 0, now)]);
        let kv = InMemoryKv::new();
        kv.set_available(false);
        let settings = Settings::default_for_tests();
        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };

        let response = orchestrator.serve(&request("C1", 120_000.0), now).await.unwrap();
        assert_eq!(response.ad_id, "A");
    }

    #[tokio::test]
    async fn all_ads_filtered_out_falls_back_to_the_least_shown_ad() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        catalog.seed(vec![make_ad("A", 1.0, 0, 0, now)]);
        let kv = InMemoryKv::new();
        let settings = Settings::default_for_tests();

        let store = ProfileStore::new(&kv);
        for _ in 0..3 {
            store.record_impression("C1", "A", now - Duration::hours(1)).await;
        }

        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };
        let response = orchestrator.serve(&request("C1", 120_000.0), now).await.unwrap();
        assert_eq!(response.ad_id, "A");
        assert!(response.fallback.is_none());
    }

    #[tokio::test]
    async fn fallback_on_empty_uses_the_thin_supply_ttl_even_with_ample_pre_filter_candidates() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        let settings = Settings::default_for_tests();
        assert!(
            5 > settings.cache_ttls.thin_supply_threshold,
            "test assumes 5 pre-filter candidates is not itself a thin-supply count"
        );
        catalog.seed(
            (0..5).map(|i| make_ad(&format!("A{i}"), 1.0, 0, 0, now)).collect(),
        );
        let kv = InMemoryKv::new();

        let store = ProfileStore::new(&kv);
        for i in 0..5 {
            for _ in 0..3 {
                store.record_impression("C1", &format!("A{i}"), now - Duration::hours(1)).await;
            }
        }

        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };
        let response = orchestrator.serve(&request("C1", 120_000.0), now).await.unwrap();
        assert!(response.fallback.is_none());

        let key = cache::cache_key(Segment::Mass, Channel::Atm, "C1");
        let ttl = kv.ttl_remaining_secs(&key).expect("fallback write populates the cache");
        assert!(
            ttl <= settings.cache_ttls.high_availability_secs as i64,
            "fallback-on-empty must use the short, thin-supply TTL, not the long one (got {ttl}s)"
        );
    }

    #[tokio::test]
    async fn outer_fallback_returns_internal_error_when_catalog_has_nothing_at_all() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::new();
        let kv = InMemoryKv::new();
        let settings = Settings::default_for_tests();
        let orchestrator = Orchestrator { catalog: &catalog, kv: &kv, settings: &settings };

        let err = orchestrator.outer_fallback(Segment::Mass, Channel::Atm, now).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

}
