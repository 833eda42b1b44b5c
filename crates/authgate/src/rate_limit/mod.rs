//! Token bucket rate limiting with pluggable storage

mod config;
mod decision;
mod error;
mod limiter;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod store;

pub use config::{RateLimitBackend, RateLimitConfig, RouteLimit, RouteOverride};
pub use decision::RateLimitDecision;
pub use error::RateLimitError;
pub use limiter::RateLimiter;
pub use memory::{DEFAULT_MAX_ENTRIES, MemoryRateLimitStore};
#[cfg(feature = "redis")]
pub use redis::{DEFAULT_KEY_PREFIX, RedisRateLimitStore};
pub use store::{Acquired, BucketLimit, RateLimitStore};
