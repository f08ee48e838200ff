//! Personalised result cache with adaptive TTL and mutation-driven
//! invalidation (spec §4.6).

use chrono::{DateTime, Utc};

use crate::config::settings::CacheTtls;
use crate::domain::ad::{Channel, Segment};
use crate::domain::serve::ServeResponse;
use crate::ports::kv::{self, KvPort};

/// `customerId` with colons/whitespace replaced by underscores, capped at 64
/// chars (spec §3 `CacheEntry`).
pub fn sanitize_customer_id(customer_id: &str) -> String {
    let cleaned: String = customer_id
        .chars()
        .map(|c| if c == ':' || c.is_whitespace() { '_' } else { c })
        .collect();
    cleaned.chars().take(64).collect()
}

pub fn cache_key(segment: Segment, channel: Channel, customer_id: &str) -> String {
    format!("ad:{}:{}:{}", segment.as_str(), channel.as_str(), sanitize_customer_id(customer_id))
}

/// Lookup is attempted only by the caller checking `kv.is_available()`
/// first; a miss or a KV error both mean "proceed to the full pipeline".
pub async fn lookup(kv: &dyn KvPort, key: &str) -> Option<ServeResponse> {
    if !kv.is_available() {
        return None;
    }
    match kv::get_json::<ServeResponse>(kv, key).await {
        Ok(found) => found,
        Err(e) => {
            log::warn!("cache lookup failed for {key}: {e}");
            None
        }
    }
}

/// `highAvailabilityTtl` when supply was thin (`candidates_after_filters <=
/// threshold`), else `lowAvailabilityTtl` — a short TTL limits repeated
/// exposure to the same ad while supply recovers.
pub fn adaptive_ttl(candidates_after_filters: usize, ttls: &CacheTtls) -> u64 {
    if candidates_after_filters <= ttls.thin_supply_threshold {
        ttls.high_availability_secs
    } else {
        ttls.low_availability_secs
    }
}

pub async fn write(kv: &dyn KvPort, key: &str, response: &ServeResponse, ttl_secs: u64) {
    if let Err(e) = kv::set_json(kv, key, response, ttl_secs).await {
        log::warn!("cache write failed for {key}: {e}");
    }
}

/// Invalidates every `ad:{seg}:{ch}:*` key for the segments/channels touched
/// by an ad mutation, in `COUNT=100` scan batches (spec §4.6). Best-effort:
/// failures are logged, never propagated. The per-pattern scans are
/// independent, so they run concurrently rather than one segment/channel
/// pair at a time.
pub async fn invalidate(kv: &dyn KvPort, segments: &[Segment], channels: &[Channel], now: DateTime<Utc>) {
    let _ = now;
    let patterns: Vec<String> = segments
        .iter()
        .flat_map(|&segment| {
            channels
                .iter()
                .map(move |&channel| format!("ad:{}:{}:*", segment.as_str(), channel.as_str()))
        })
        .collect();

    let invalidations = patterns.iter().map(|pattern| async move {
        if let Err(e) = invalidate_pattern(kv, pattern).await {
            log::warn!("cache invalidation failed for pattern {pattern}: {e}");
        }
    });
    futures::future::join_all(invalidations).await;
}

async fn invalidate_pattern(kv: &dyn KvPort, pattern: &str) -> Result<(), crate::utils::errors::KvError> {
    let mut cursor = 0u64;
    loop {
        let (next, keys) = kv.scan(pattern, cursor, 100).await?;
        if !keys.is_empty() {
            kv.delete(&keys).await?;
        }
        if next == 0 {
            break;
        }
        cursor = next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryKv;
    use crate::domain::ad::{Channel, Segment};

    #[test]
    fn sanitize_replaces_colons_and_whitespace() {
        assert_eq!(sanitize_customer_id("c 1:2"), "c_1_2");
    }

    #[test]
    fn sanitize_truncates_to_64_chars() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_customer_id(&long).len(), 64);
    }

    #[test]
    fn cache_key_matches_shape() {
        assert_eq!(cache_key(Segment::Mass, Channel::Atm, "C1"), "ad:mass:ATM:C1");
    }

    #[test]
    fn adaptive_ttl_is_short_for_thin_supply() {
        let ttls = CacheTtls::default();
        assert_eq!(adaptive_ttl(1, &ttls), ttls.high_availability_secs);
        assert_eq!(adaptive_ttl(3, &ttls), ttls.high_availability_secs);
        assert_eq!(adaptive_ttl(4, &ttls), ttls.low_availability_secs);
    }

    #[tokio::test]
    async fn write_then_lookup_round_trips() {
        let kv = InMemoryKv::new();
        let resp = ServeResponse {
            ad_id: "a".into(),
            title: "t".into(),
            image_url: "i".into(),
            video_url: None,
            cta: None,
            segment: Segment::Mass,
            channel: Channel::Atm,
            fallback: None,
        };
        write(&kv, "ad:mass:ATM:c1", &resp, 30).await;
        let found = lookup(&kv, "ad:mass:ATM:c1").await;
        assert_eq!(found.unwrap().ad_id, "a");
    }

    #[tokio::test]
    async fn lookup_returns_none_when_kv_unavailable() {
        let kv = InMemoryKv::new();
        kv.set_available(false);
        assert!(lookup(&kv, "ad:mass:ATM:c1").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_matching_keys_only() {
        let kv = InMemoryKv::new();
        kv.set_with_ttl("ad:mass:ATM:c1", "{}", 30).await.unwrap();
        kv.set_with_ttl("ad:low:ATM:c1", "{}", 30).await.unwrap();

        invalidate(&kv, &[Segment::Mass], &[Channel::Atm], Utc::now()).await;

        assert!(kv.get("ad:mass:ATM:c1").await.unwrap().is_none());
        assert!(kv.get("ad:low:ATM:c1").await.unwrap().is_some());
    }
}
