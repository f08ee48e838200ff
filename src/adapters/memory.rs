// src/adapters/memory.rs
//
// Hermetic in-memory adapters used by the test suite to realise every
// scenario in spec §8 without a live Postgres or Redis (SPEC_FULL §10.4).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ad::{Ad, Channel, Segment};
use crate::ports::catalog::CatalogPort;
use crate::ports::kv::{KvOp, KvOpResult, KvPort};
use crate::utils::errors::{CatalogError, KvError};

#[derive(Default)]
pub struct InMemoryCatalog {
    ads: Mutex<Vec<Ad>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, ads: Vec<Ad>) {
        *self.ads.lock().expect("catalog lock") = ads;
    }

    fn matching(&self, segment: Segment, channel: Channel, now: DateTime<Utc>) -> Vec<Ad> {
        let mut matches: Vec<Ad> = self
            .ads
            .lock()
            .expect("catalog lock")
            .iter()
            .filter(|ad| {
                ad.status == crate::domain::ad::AdStatus::Active
                    && ad.segments.contains(&segment)
                    && ad.channels.contains(&channel)
                    && ad.start_date <= now
                    && now <= ad.end_date
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal));
        matches
    }
}

#[async_trait]
impl CatalogPort for InMemoryCatalog {
    async fn find_candidates(
        &self,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ad>, CatalogError> {
        Ok(self.matching(segment, channel, now))
    }

    async fn create_ad(&self, ad: Ad) -> Result<Ad, CatalogError> {
        self.ads.lock().expect("catalog lock").push(ad.clone());
        Ok(ad)
    }

    async fn increment_impressions(&self, ad_id: &str) -> Result<bool, CatalogError> {
        let mut ads = self.ads.lock().expect("catalog lock");
        match ads.iter_mut().find(|a| a.id == ad_id) {
            Some(ad) => {
                ad.impressions += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_clicks(&self, ad_id: &str) -> Result<bool, CatalogError> {
        let mut ads = self.ads.lock().expect("catalog lock");
        match ads.iter_mut().find(|a| a.id == ad_id) {
            Some(ad) => {
                ad.clicks += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_one(
        &self,
        segment: Segment,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Option<Ad>, CatalogError> {
        Ok(self.matching(segment, channel, now).into_iter().next())
    }
}

/// In-memory KV backing a sorted-set-capable store, faithful enough to the
/// Redis semantics the rate limiter and cache rely on (score-ordered
/// members, TTL-driven expiry checked lazily on access).
#[derive(Default)]
pub struct InMemoryKv {
    strings: Mutex<BTreeMap<String, (String, Option<DateTime<Utc>>)>>,
    sorted_sets: Mutex<BTreeMap<String, Vec<(String, f64)>>>,
    available: AtomicBool,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self {
            strings: Mutex::new(BTreeMap::new()),
            sorted_sets: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Seconds left on `key`'s TTL, for tests that assert which adaptive TTL
    /// tier a write landed in without reaching into the KV port.
    pub fn ttl_remaining_secs(&self, key: &str) -> Option<i64> {
        let strings = self.strings.lock().expect("kv lock");
        let (_, expiry) = strings.get(key)?;
        expiry.map(|e| (e - Self::now()).num_seconds())
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn expire_strings(&self) {
        let now = Self::now();
        self.strings
            .lock()
            .expect("kv lock")
            .retain(|_, (_, expiry)| expiry.map(|e| e > now).unwrap_or(true));
    }
}

#[async_trait]
impl KvPort for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        self.expire_strings();
        Ok(self
            .strings
            .lock()
            .expect("kv lock")
            .get(key)
            .map(|(v, _)| v.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        let expiry = (ttl_secs > 0).then(|| Self::now() + chrono::Duration::seconds(ttl_secs as i64));
        self.strings
            .lock()
            .expect("kv lock")
            .insert(key.to_string(), (value.to_string(), expiry));
        Ok(())
    }

    async fn sorted_set_remove_range(
        &self,
        key: &str,
        min_score: f64,
        max_score: f64,
    ) -> Result<(), KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        if let Some(set) = self.sorted_sets.lock().expect("kv lock").get_mut(key) {
            set.retain(|(_, score)| !(*score >= min_score && *score <= max_score));
        }
        Ok(())
    }

    async fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<(), KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        let mut sets = self.sorted_sets.lock().expect("kv lock");
        let set = sets.entry(key.to_string()).or_default();
        set.retain(|(m, _)| m != member);
        set.push((member.to_string(), score));
        Ok(())
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64, KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        Ok(self
            .sorted_sets
            .lock()
            .expect("kv lock")
            .get(key)
            .map(|s| s.len() as u64)
            .unwrap_or(0))
    }

    async fn expire(&self, _key: &str, _seconds: u64) -> Result<(), KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        // Sorted sets in this test double don't carry their own TTL clock;
        // the sliding-window removal step is what actually bounds their size.
        Ok(())
    }

    async fn pipeline(&self, ops: Vec<KvOp>) -> Result<Vec<KvOpResult>, KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                KvOp::Get { key } => {
                    results.push(KvOpResult::Value(self.get(&key).await?));
                }
                KvOp::SetWithTtl { key, value, ttl_secs } => {
                    self.set_with_ttl(&key, &value, ttl_secs).await?;
                    results.push(KvOpResult::Ack);
                }
                KvOp::SortedSetRemoveRange { key, min_score, max_score } => {
                    self.sorted_set_remove_range(&key, min_score, max_score).await?;
                    results.push(KvOpResult::Ack);
                }
                KvOp::SortedSetAdd { key, score, member } => {
                    self.sorted_set_add(&key, score, &member).await?;
                    results.push(KvOpResult::Ack);
                }
                KvOp::SortedSetCardinality { key } => {
                    results.push(KvOpResult::Count(self.sorted_set_cardinality(&key).await?));
                }
                KvOp::Expire { key, seconds } => {
                    self.expire(&key, seconds).await?;
                    results.push(KvOpResult::Ack);
                }
            }
        }
        Ok(results)
    }

    async fn scan(&self, pattern: &str, _cursor: u64, _count: u64) -> Result<(u64, Vec<String>), KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        self.expire_strings();
        let re = glob_to_regex(pattern);
        let keys: Vec<String> = self
            .strings
            .lock()
            .expect("kv lock")
            .keys()
            .filter(|k| re.is_match(k))
            .cloned()
            .collect();
        Ok((0, keys))
    }

    async fn delete(&self, keys: &[String]) -> Result<(), KvError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(KvError::Unavailable("in-memory kv disabled".into()));
        }
        let mut strings = self.strings.lock().expect("kv lock");
        for key in keys {
            strings.remove(key);
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}

/// Minimal glob (`*` only) to regex translation, enough for the
/// `ad:{segment}:{channel}:*` invalidation pattern (spec §4.6). Uses the
/// teacher's own `regex` dependency (`services/blowfin/auth.rs` parses HMAC
/// headers with it), not a new one.
fn glob_to_regex(pattern: &str) -> regex::Regex {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            c if regex_special(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    regex::Regex::new(&out).expect("glob pattern translates to valid regex")
}

fn regex_special(c: char) -> bool {
    matches!(c, '.' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_matches_glob_pattern() {
        let kv = InMemoryKv::new();
        kv.set_with_ttl("ad:mass:ATM:c1", "{}", 30).await.unwrap();
        kv.set_with_ttl("ad:mass:web:c1", "{}", 30).await.unwrap();
        kv.set_with_ttl("ad:low:ATM:c2", "{}", 30).await.unwrap();

        let (_cursor, keys) = kv.scan("ad:mass:ATM:*", 0, 100).await.unwrap();
        assert_eq!(keys, vec!["ad:mass:ATM:c1".to_string()]);
    }

    #[tokio::test]
    async fn sorted_set_remove_range_trims_old_members() {
        let kv = InMemoryKv::new();
        kv.sorted_set_add("rl", 100.0, "a").await.unwrap();
        kv.sorted_set_add("rl", 200.0, "b").await.unwrap();
        kv.sorted_set_remove_range("rl", 0.0, 150.0).await.unwrap();
        assert_eq!(kv.sorted_set_cardinality("rl").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn increment_impressions_reports_not_found_for_unknown_ad() {
        let catalog = InMemoryCatalog::new();
        assert!(!catalog.increment_impressions("missing").await.unwrap());
    }

    #[tokio::test]
    async fn increment_clicks_reports_not_found_for_unknown_ad() {
        let catalog = InMemoryCatalog::new();
        assert!(!catalog.increment_clicks("missing").await.unwrap());
    }

    #[tokio::test]
    async fn increment_impressions_reports_found_and_bumps_the_counter() {
        let catalog = InMemoryCatalog::new();
        let now = Utc::now();
        catalog.seed(vec![Ad {
            id: "a".into(),
            title: "t".into(),
            image_url: "i".into(),
            video_url: None,
            cta: None,
            segments: vec![Segment::Mass],
            channels: vec![Channel::Atm],
            locations: None,
            time_slots: None,
            start_date: now,
            end_date: now,
            status: crate::domain::ad::AdStatus::Active,
            priority: 1.0,
            impressions: 0,
            clicks: 0,
            advertiser: None,
            created_at: now,
            updated_at: now,
        }]);
        assert!(catalog.increment_impressions("a").await.unwrap());
        assert_eq!(catalog.find_one(Segment::Mass, Channel::Atm, now).await.unwrap().unwrap().impressions, 1);
    }

    #[tokio::test]
    async fn unavailable_flag_fails_every_operation() {
        let kv = InMemoryKv::new();
        kv.set_available(false);
        assert!(kv.get("x").await.is_err());
        assert!(!kv.is_available());
    }
}
