//! Shared token buckets in Redis
//!
//! Refill, take and write-back run in one Lua script against the server
//! clock, so every instance sees the same bucket.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::error::RateLimitError;
use super::store::{Acquired, BucketLimit, RateLimitStore};
use crate::{Error, Result};

pub const DEFAULT_KEY_PREFIX: &str = "authgate:rl:";

const TOKEN_BUCKET_SCRIPT: &str = r"
local capacity = tonumber(ARGV[1])
local refill = tonumber(ARGV[2])
local ttl_ms = tonumber(ARGV[3])

local clock = redis.call('TIME')
local now = tonumber(clock[1]) + tonumber(clock[2]) / 1000000

local state = redis.call('HMGET', KEYS[1], 'tokens', 'ts')
local tokens = tonumber(state[1])
local ts = tonumber(state[2])
if tokens == nil or ts == nil then
    tokens = capacity
    ts = now
end

tokens = math.min(capacity, tokens + math.max(0, now - ts) * refill)

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', KEYS[1], 'tokens', tostring(tokens), 'ts', tostring(now))
redis.call('PEXPIRE', KEYS[1], ttl_ms)
return {allowed, tostring(tokens)}
";

#[derive(Clone)]
pub struct RedisRateLimitStore {
    manager: ConnectionManager,
    prefix: String,
    script: redis::Script,
}

impl std::fmt::Debug for RedisRateLimitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimitStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisRateLimitStore {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Config(format!("Invalid Redis URL: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Config(format!("Redis connection failed: {e}")))?;

        tracing::info!("Connected rate limit store to Redis");
        Ok(Self {
            manager,
            prefix: prefix.into(),
            script: redis::Script::new(TOKEN_BUCKET_SCRIPT),
        })
    }

    fn namespaced_key(&self, key: &str) -> String {
        namespaced(&self.prefix, key)
    }
}

fn namespaced(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

/// Expiry for an idle bucket: one full refill plus a second
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn idle_ttl_ms(limit: &BucketLimit) -> u64 {
    (limit.full_refill_secs() * 1000.0).ceil() as u64 + 1000
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn acquire(
        &self,
        key: &str,
        limit: &BucketLimit,
    ) -> std::result::Result<Acquired, RateLimitError> {
        let mut conn = self.manager.clone();
        let (allowed, tokens): (i64, String) = self
            .script
            .key(self.namespaced_key(key))
            .arg(limit.capacity)
            .arg(limit.refill_per_sec)
            .arg(idle_ttl_ms(limit))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::BackendUnavailable(format!("redis script: {e}")))?;

        let tokens = tokens
            .parse()
            .map_err(|e| RateLimitError::BackendUnavailable(format!("redis reply: {e}")))?;

        Ok(Acquired {
            allowed: allowed == 1,
            tokens,
        })
    }

    async fn reset(&self, key: &str) -> std::result::Result<(), RateLimitError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(self.namespaced_key(key))
            .await
            .map_err(|e| RateLimitError::BackendUnavailable(format!("redis del: {e}")))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespacing() {
        assert_eq!(namespaced(DEFAULT_KEY_PREFIX, "user:42"), "authgate:rl:user:42");
    }

    #[test]
    fn test_idle_ttl_covers_full_refill() {
        assert_eq!(idle_ttl_ms(&BucketLimit::new(60, 0)), 61_000);
        assert_eq!(idle_ttl_ms(&BucketLimit::new(10, 5)), 91_000);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let err = RedisRateLimitStore::connect("not-a-url", DEFAULT_KEY_PREFIX)
            .await
            .unwrap_err();
        assert!(err.is_config());
    }
}
