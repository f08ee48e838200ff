// src/adapters/postgres_catalog.rs
//
// Document-store-backed catalog port, expressed over Postgres' `jsonb` the
// way the teacher's `db/queries.rs` expresses relational lookups with
// `sqlx::query_as!` — here the ad body is a single jsonb column since the
// spec treats the catalog as a document store and only cares about the
// fields the engine consumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::ad::{Ad, Channel, Segment};
use crate::ports::catalog::CatalogPort;
use crate::utils::errors::CatalogError;

/// Soft execution cap for `find_candidates` (spec §4.1).
const CATALOG_SOFT_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
    available: Arc<AtomicBool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, available: Arc::new(AtomicBool::new(true)) }
    }

    /// Background liveness probe, the only writer of the availability flag
    /// (spec §5's "shared-resource policy"), mirroring `RedisKv`'s.
    pub fn spawn_health_probe(&self, interval: Duration) {
        let pool = self.pool.clone();
        let flag = self.available.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let ok = sqlx::query("SELECT 1").execute(&pool).await.is_ok();
                flag.store(ok, Ordering::Relaxed);
            }
        });
    }

    async fn with_deadline<T>(
        fut: impl std::future::Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, CatalogError> {
        match tokio::time::timeout(CATALOG_SOFT_DEADLINE, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(CatalogError::Backend(e.to_string())),
            Err(_) => Err(CatalogError::Timeout),
        }
    }
}

#[async_trait]
impl CatalogPort for PostgresCatalog {
    async fn find_candidates(
        &self,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ad>, CatalogError> {
        let rows = Self::with_deadline(
            sqlx::query(
                r#"
                SELECT body FROM ads
                 WHERE status = 'active'
                   AND body->'segments' ? $1
                   AND body->'channels' ? $2
                   AND start_date <= $3
                   AND end_date   >= $3
                 ORDER BY priority DESC
                "#,
            )
            .bind(segment.as_str())
            .bind(channel.as_str())
            .bind(now)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.into_iter()
            .map(|row| {
                let body: serde_json::Value = row.try_get("body").map_err(|e| CatalogError::Backend(e.to_string()))?;
                serde_json::from_value(body).map_err(|e| CatalogError::Backend(e.to_string()))
            })
            .collect()
    }

    async fn create_ad(&self, ad: Ad) -> Result<Ad, CatalogError> {
        let body = serde_json::to_value(&ad).map_err(|e| CatalogError::Backend(e.to_string()))?;
        Self::with_deadline(
            sqlx::query(
                r#"
                INSERT INTO ads (id, status, priority, start_date, end_date, body)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&ad.id)
            .bind(match ad.status {
                crate::domain::ad::AdStatus::Active => "active",
                crate::domain::ad::AdStatus::Inactive => "inactive",
            })
            .bind(ad.priority)
            .bind(ad.start_date)
            .bind(ad.end_date)
            .bind(body)
            .execute(&self.pool),
        )
        .await?;
        Ok(ad)
    }

    async fn increment_impressions(&self, ad_id: &str) -> Result<bool, CatalogError> {
        let result = Self::with_deadline(
            sqlx::query(
                r#"
                UPDATE ads
                   SET body = jsonb_set(body, '{impressions}',
                              to_jsonb(COALESCE((body->>'impressions')::bigint, 0) + 1))
                 WHERE id = $1
                "#,
            )
            .bind(ad_id)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_clicks(&self, ad_id: &str) -> Result<bool, CatalogError> {
        let result = Self::with_deadline(
            sqlx::query(
                r#"
                UPDATE ads
                   SET body = jsonb_set(body, '{clicks}',
                              to_jsonb(COALESCE((body->>'clicks')::bigint, 0) + 1))
                 WHERE id = $1
                "#,
            )
            .bind(ad_id)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_one(
        &self,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Option<Ad>, CatalogError> {
        let row = Self::with_deadline(
            sqlx::query(
                r#"
                SELECT body FROM ads
                 WHERE status = 'active'
                   AND body->'segments' ? $1
                   AND body->'channels' ? $2
                   AND start_date <= $3
                   AND end_date   >= $3
                 ORDER BY priority DESC
                 LIMIT 1
                "#,
            )
            .bind(segment.as_str())
            .bind(channel.as_str())
            .bind(now)
            .fetch_optional(&self.pool),
        )
        .await?;

        match row {
            Some(row) => {
                let body: serde_json::Value =
                    row.try_get("body").map_err(|e| CatalogError::Backend(e.to_string()))?;
                Ok(Some(
                    serde_json::from_value(body).map_err(|e| CatalogError::Backend(e.to_string()))?,
                ))
            }
            None => Ok(None),
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}
