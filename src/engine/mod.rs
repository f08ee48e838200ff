pub mod cache;
pub mod filters;
pub mod orchestrator;
pub mod profile_store;
pub mod rate_limiter;
pub mod scorer;

pub use orchestrator::Orchestrator;
