// src/adapters/redis_kv.rs
//
// Redis-backed `KvPort`. Keeps the teacher's `ConnectionManager` + cheap
// clone handle shape (see the retired `db/redis.rs`), generalised to the
// sorted-set and pipeline operations the rate limiter and cache need.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use crate::ports::kv::{KvOp, KvOpResult, KvPort};
use crate::utils::errors::KvError;

/// Thin, cheap-to-clone handle shared via `app_data`.
#[derive(Clone)]
pub struct RedisKv {
    manager: ConnectionManager,
    available: Arc<AtomicBool>,
}

impl RedisKv {
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager,
            available: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Background liveness probe; the only writer of the availability flag
    /// (spec §5 "shared-resource policy").
    pub fn spawn_health_probe(&self, interval: Duration) {
        let mut conn = self.manager.clone();
        let flag = self.available.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let ok = redis::cmd("PING")
                    .query_async::<_, String>(&mut conn)
                    .await
                    .is_ok();
                flag.store(ok, Ordering::Relaxed);
            }
        });
    }

    fn err(e: RedisError) -> KvError {
        KvError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl KvPort for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(Self::err)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        if ttl_secs == 0 {
            conn.set::<_, _, ()>(key, value).await.map_err(Self::err)
        } else {
            conn.set_ex::<_, _, ()>(key, value, ttl_secs)
                .await
                .map_err(Self::err)
        }
    }

    async fn sorted_set_remove_range(
        &self,
        key: &str,
        min_score: f64,
        max_score: f64,
    ) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        conn.zrembyscore::<_, _, _, ()>(key, min_score, max_score)
            .await
            .map_err(Self::err)
    }

    async fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        conn.zadd::<_, _, _, ()>(key, member, score)
            .await
            .map_err(Self::err)
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64, KvError> {
        let mut conn = self.manager.clone();
        conn.zcard(key).await.map_err(Self::err)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        conn.expire::<_, ()>(key, seconds as i64)
            .await
            .map_err(Self::err)
    }

    async fn pipeline(&self, ops: Vec<KvOp>) -> Result<Vec<KvOpResult>, KvError> {
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();

        for op in &ops {
            match op {
                KvOp::Get { key } => {
                    pipe.get(key);
                }
                KvOp::SetWithTtl { key, value, ttl_secs } => {
                    if *ttl_secs == 0 {
                        pipe.set(key, value);
                    } else {
                        pipe.set_ex(key, value, *ttl_secs);
                    }
                    pipe.ignore();
                }
                KvOp::SortedSetRemoveRange { key, min_score, max_score } => {
                    pipe.zrembyscore(key, *min_score, *max_score);
                    pipe.ignore();
                }
                KvOp::SortedSetAdd { key, score, member } => {
                    pipe.zadd(key, member, *score);
                    pipe.ignore();
                }
                KvOp::SortedSetCardinality { key } => {
                    pipe.zcard(key);
                }
                KvOp::Expire { key, seconds } => {
                    pipe.expire(key, *seconds as i64);
                    pipe.ignore();
                }
            }
        }

        let raw: Vec<redis::Value> = pipe.query_async(&mut conn).await.map_err(Self::err)?;
        let mut results = Vec::with_capacity(ops.len());
        let mut raw_iter = raw.into_iter();

        for op in &ops {
            match op {
                KvOp::Get { .. } => {
                    let v = raw_iter.next().unwrap_or(redis::Value::Nil);
                    let s: Option<String> = redis::from_redis_value(&v).unwrap_or(None);
                    results.push(KvOpResult::Value(s));
                }
                KvOp::SortedSetCardinality { .. } => {
                    let v = raw_iter.next().unwrap_or(redis::Value::Nil);
                    let n: u64 = redis::from_redis_value(&v).unwrap_or(0);
                    results.push(KvOpResult::Count(n));
                }
                _ => results.push(KvOpResult::Ack),
            }
        }
        Ok(results)
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: u64) -> Result<(u64, Vec<String>), KvError> {
        let mut conn = self.manager.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(Self::err)?;
        Ok((next, keys))
    }

    async fn delete(&self, keys: &[String]) -> Result<(), KvError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(keys).await.map_err(Self::err)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}
