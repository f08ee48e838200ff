pub mod catalog;
pub mod kv;

pub use catalog::CatalogPort;
pub use kv::{get_json, set_json, KvOp, KvOpResult, KvPort};
