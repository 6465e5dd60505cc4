pub mod breaker;
pub mod cache;
pub mod client;
pub mod limiter;
pub mod source;

pub use breaker::{BreakerState, CircuitBreaker};
pub use cache::TtlCache;
pub use client::{Fetched, OracleClient, OracleConfig};
pub use limiter::RateLimiter;
pub use source::{GroundTruthSource, HttpSource, HttpSourceConfig};
