//! Per-customer impression history, read-modify-write against the KV port
//! (spec §4.3). Never fails outward: every error is logged and degrades to
//! an empty profile / a no-op write.

use chrono::{DateTime, Utc};

use crate::domain::profile::{UserProfile, PROFILE_TTL_SECS};
use crate::ports::kv::{self, KvOp, KvPort};

pub struct ProfileStore<'a> {
    kv: &'a dyn KvPort,
}

fn profile_key(customer_id: &str) -> String {
    format!("userprofile:{customer_id}")
}

impl<'a> ProfileStore<'a> {
    pub fn new(kv: &'a dyn KvPort) -> Self {
        Self { kv }
    }

    /// Returns the parsed profile, or a fresh empty one on miss or any KV
    /// error. This call never fails.
    pub async fn get(&self, customer_id: &str, now: DateTime<Utc>) -> UserProfile {
        match kv::get_json::<UserProfile>(self.kv, &profile_key(customer_id)).await {
            Ok(Some(mut profile)) => {
                profile.retain_recent(now);
                profile
            }
            Ok(None) => UserProfile::empty(customer_id, now),
            Err(e) => {
                log::warn!("profile store: get({customer_id}) failed, using empty profile: {e}");
                UserProfile::empty(customer_id, now)
            }
        }
    }

    /// Appends an impression and persists with TTL 86,400s via a single
    /// pipeline (`set` + `expire`), per spec §4.3. Swallows every error
    /// after logging — non-blocking semantics.
    pub async fn record_impression(&self, customer_id: &str, ad_id: &str, now: DateTime<Utc>) {
        let mut profile = self.get(customer_id, now).await;
        profile.record(ad_id, now);

        let payload = match serde_json::to_string(&profile) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("profile store: serialize failed for {customer_id}: {e}");
                return;
            }
        };

        let key = profile_key(customer_id);
        let ops = vec![
            KvOp::SetWithTtl {
                key: key.clone(),
                value: payload,
                ttl_secs: PROFILE_TTL_SECS as u64,
            },
            KvOp::Expire { key, seconds: PROFILE_TTL_SECS as u64 },
        ];

        if let Err(e) = self.kv.pipeline(ops).await {
            log::warn!("profile store: record_impression({customer_id}, {ad_id}) failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryKv;
    use chrono::Duration;

    #[tokio::test]
    async fn get_returns_empty_profile_on_miss() {
        let kv = InMemoryKv::new();
        let store = ProfileStore::new(&kv);
        let now = Utc::now();
        let profile = store.get("c1", now).await;
        assert!(profile.impressions.is_empty());
    }

    #[tokio::test]
    async fn record_impression_then_get_round_trips() {
        let kv = InMemoryKv::new();
        let store = ProfileStore::new(&kv);
        let now = Utc::now();
        store.record_impression("c1", "ad-1", now).await;

        let profile = store.get("c1", now).await;
        assert_eq!(profile.impressions.len(), 1);
        assert_eq!(profile.impressions[0].ad_id, "ad-1");
    }

    #[tokio::test]
    async fn kv_unavailable_degrades_to_empty_profile_without_panicking() {
        let kv = InMemoryKv::new();
        kv.set_available(false);
        let store = ProfileStore::new(&kv);
        let now = Utc::now();

        // record_impression must not panic even though every KV op fails.
        store.record_impression("c1", "ad-1", now).await;
        let profile = store.get("c1", now).await;
        assert!(profile.impressions.is_empty());
    }

    #[tokio::test]
    async fn old_entries_are_pruned_on_read() {
        let kv = InMemoryKv::new();
        let store = ProfileStore::new(&kv);
        let earlier = Utc::now() - Duration::hours(30);
        store.record_impression("c1", "ad-1", earlier).await;

        let profile = store.get("c1", Utc::now()).await;
        assert!(profile.impressions.is_empty());
    }
}
