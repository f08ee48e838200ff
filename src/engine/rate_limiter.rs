//! Dual-layer sliding-window rate limiter (spec §4.7): per-IP and
//! per-API-key-tier buckets, each backed by a KV sorted set. Atomic per
//! bucket via `KvPort::pipeline`, fail-open on KV unavailability.

use crate::config::settings::RateLimitWindow;
use crate::ports::kv::{KvOp, KvOpResult, KvPort};
use crate::utils::clock::Clock;
use crate::utils::errors::KvError;
use crate::utils::random::SuffixGen;

pub struct Admission {
    pub allowed: bool,
    pub retry_after_secs: u64,
    pub remaining: u64,
}

fn bucket_key(dimension: &str, key: &str, path: &str) -> String {
    format!("ratelimit:{dimension}:{key}:{path}")
}

/// Runs the sliding-window admission step for one bucket (spec §4.7): remove
/// stale members, add this request's member, read cardinality, reset TTL —
/// all in one atomic pipeline. On any KV error, fails open (admits the
/// request) per §5's degradation matrix.
pub async fn admit(
    kv: &dyn KvPort,
    clock: &dyn Clock,
    suffix_gen: &dyn SuffixGen,
    dimension: &str,
    key: &str,
    path: &str,
    window: RateLimitWindow,
) -> Admission {
    let bucket = bucket_key(dimension, key, path);
    let now_ms = clock.now().timestamp_millis() as f64;
    let window_ms = (window.window_secs * 1000) as f64;
    let cutoff = now_ms - window_ms;
    let member = format!("{}:{}", clock.now().timestamp_millis(), suffix_gen.suffix());

    let ops = vec![
        KvOp::SortedSetRemoveRange { key: bucket.clone(), min_score: 0.0, max_score: cutoff },
        KvOp::SortedSetAdd { key: bucket.clone(), score: now_ms, member },
        KvOp::SortedSetCardinality { key: bucket.clone() },
        KvOp::Expire { key: bucket, seconds: window.window_secs },
    ];

    match kv.pipeline(ops).await {
        Ok(results) => {
            let count = results
                .iter()
                .find_map(|r| match r {
                    KvOpResult::Count(n) => Some(*n),
                    _ => None,
                })
                .unwrap_or(0);
            let exceeded = count > window.max_requests as u64;
            let remaining = window.max_requests.saturating_sub(count);
            Admission {
                allowed: !exceeded,
                retry_after_secs: if exceeded { window.window_secs } else { 0 },
                remaining,
            }
        }
        Err(e) => {
            log_fail_open(&e);
            Admission { allowed: true, retry_after_secs: 0, remaining: window.max_requests }
        }
    }
}

fn log_fail_open(e: &KvError) {
    log::warn!("rate limiter: kv error, failing open: {e}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryKv;
    use crate::utils::clock::FixedClock;
    use crate::utils::random::SeededSuffix;
    use chrono::Utc;

    fn window(max: u64) -> RateLimitWindow {
        RateLimitWindow { window_secs: 60, max_requests: max }
    }

    #[tokio::test]
    async fn admits_requests_under_the_limit() {
        let kv = InMemoryKv::new();
        let clock = FixedClock(Utc::now());
        let suffix = SeededSuffix::new(1);
        let w = window(3);

        for _ in 0..3 {
            let admission = admit(&kv, &clock, &suffix, "ip", "1.2.3.4", "/serve", w).await;
            assert!(admission.allowed);
        }
    }

    #[tokio::test]
    async fn denies_once_the_limit_is_exceeded() {
        let kv = InMemoryKv::new();
        let clock = FixedClock(Utc::now());
        let suffix = SeededSuffix::new(1);
        let w = window(2);

        admit(&kv, &clock, &suffix, "ip", "1.2.3.4", "/serve", w).await;
        admit(&kv, &clock, &suffix, "ip", "1.2.3.4", "/serve", w).await;
        let third = admit(&kv, &clock, &suffix, "ip", "1.2.3.4", "/serve", w).await;

        assert!(!third.allowed);
        assert_eq!(third.retry_after_secs, w.window_secs);
    }

    #[tokio::test]
    async fn fails_open_when_kv_unavailable() {
        let kv = InMemoryKv::new();
        kv.set_available(false);
        let clock = FixedClock(Utc::now());
        let suffix = SeededSuffix::new(1);
        let w = window(1);

        let first = admit(&kv, &clock, &suffix, "ip", "1.2.3.4", "/serve", w).await;
        let second = admit(&kv, &clock, &suffix, "ip", "1.2.3.4", "/serve", w).await;
        assert!(first.allowed);
        assert!(second.allowed);
    }

    #[tokio::test]
    async fn distinct_dimensions_do_not_share_a_bucket() {
        let kv = InMemoryKv::new();
        let clock = FixedClock(Utc::now());
        let suffix = SeededSuffix::new(1);
        let w = window(1);

        let ip_admission = admit(&kv, &clock, &suffix, "ip", "1.2.3.4", "/serve", w).await;
        let tier_admission = admit(&kv, &clock, &suffix, "tier", "standard", "/serve", w).await;
        assert!(ip_admission.allowed);
        assert!(tier_admission.allowed);
    }
}
