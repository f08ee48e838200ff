pub mod api_key;
pub mod metrics;
pub mod path_logger;
pub mod rate_limit;

pub use metrics::Metrics;
pub use path_logger::PathLogger;
pub use rate_limit::RateLimit;
