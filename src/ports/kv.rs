//! Abstract key-value interface (spec §4.2): GET/SET with TTL, sorted-set
//! ops for the rate limiter, pipeline/atomic batching, and glob SCAN for
//! cache invalidation.

use crate::utils::errors::KvError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// One step of an atomic batch. The rate limiter's sliding-window step and
/// the profile store's read-modify-write both compose a handful of these
/// into one `pipeline()` call (spec §4.2, §4.7).
#[derive(Debug, Clone)]
pub enum KvOp {
    Get { key: String },
    SetWithTtl { key: String, value: String, ttl_secs: u64 },
    SortedSetRemoveRange { key: String, min_score: f64, max_score: f64 },
    SortedSetAdd { key: String, score: f64, member: String },
    SortedSetCardinality { key: String },
    Expire { key: String, seconds: u64 },
}

#[derive(Debug, Clone)]
pub enum KvOpResult {
    Value(Option<String>),
    Count(u64),
    Ack,
}

#[async_trait]
pub trait KvPort: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError>;
    async fn sorted_set_remove_range(
        &self,
        key: &str,
        min_score: f64,
        max_score: f64,
    ) -> Result<(), KvError>;
    async fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<(), KvError>;
    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64, KvError>;
    async fn expire(&self, key: &str, seconds: u64) -> Result<(), KvError>;

    /// Runs every op as one atomic unit; reads in the batch reflect the
    /// batch's own writes (spec §4.2). Used by the rate limiter (§4.7) so
    /// the remove/add/cardinality/expire step is indivisible.
    async fn pipeline(&self, ops: Vec<KvOp>) -> Result<Vec<KvOpResult>, KvError>;

    /// Glob-style scan, cursor-based like Redis `SCAN`. Returns the next
    /// cursor (0 means the cycle is complete) and the keys matched in this
    /// batch.
    async fn scan(&self, pattern: &str, cursor: u64, count: u64) -> Result<(u64, Vec<String>), KvError>;

    async fn delete(&self, keys: &[String]) -> Result<(), KvError>;

    /// Last observed connection state, written only by connection-lifecycle
    /// events (spec §5); reading never itself performs I/O.
    fn is_available(&self) -> bool;
}

/// JSON convenience wrapper over `get`, mirroring the teacher's
/// `RedisPool::get_json`. A free function rather than a trait default
/// because `KvPort` is used as a trait object and default methods can't be
/// generic over `T` there.
pub async fn get_json<T: DeserializeOwned>(
    kv: &dyn KvPort,
    key: &str,
) -> Result<Option<T>, KvError> {
    match kv.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| KvError::Serde(e.to_string())),
        None => Ok(None),
    }
}

/// JSON convenience wrapper over `set_with_ttl`.
pub async fn set_json<T: Serialize + Sync>(
    kv: &dyn KvPort,
    key: &str,
    value: &T,
    ttl_secs: u64,
) -> Result<(), KvError> {
    let payload = serde_json::to_string(value).map_err(|e| KvError::Serde(e.to_string()))?;
    kv.set_with_ttl(key, &payload, ttl_secs).await
}
