pub mod memory;
pub mod postgres_catalog;
pub mod redis_kv;

pub use memory::{InMemoryCatalog, InMemoryKv};
pub use postgres_catalog::PostgresCatalog;
pub use redis_kv::RedisKv;
