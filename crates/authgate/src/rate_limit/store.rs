//! Token bucket storage backends

use async_trait::async_trait;

use super::error::RateLimitError;

/// Bucket shape for one admission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLimit {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl BucketLimit {
    /// Capacity `rpm + burst`, refilled at `rpm / 60` tokens per second
    #[must_use]
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Self {
        Self {
            capacity: f64::from(requests_per_minute) + f64::from(burst_size),
            refill_per_sec: f64::from(requests_per_minute) / 60.0,
        }
    }

    /// Seconds for an empty bucket to refill completely
    pub fn full_refill_secs(&self) -> f64 {
        self.capacity / self.refill_per_sec
    }
}

/// Result of taking one token
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acquired {
    pub allowed: bool,
    /// Tokens left after the admission
    pub tokens: f64,
}

/// Atomic per-key token bucket
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Refill, then take one token if available
    async fn acquire(&self, key: &str, limit: &BucketLimit) -> Result<Acquired, RateLimitError>;

    /// Forget a key, restoring a full bucket
    async fn reset(&self, key: &str) -> Result<(), RateLimitError>;

    fn name(&self) -> &'static str;
}
