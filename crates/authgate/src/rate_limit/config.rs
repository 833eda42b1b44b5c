//! Rate limiting settings

use std::time::Duration;

use super::memory::DEFAULT_MAX_ENTRIES;
use super::store::BucketLimit;
use crate::constants::API_KEY_HEADER;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RateLimitBackend {
    #[default]
    Memory,
    /// Shared store; requires the `redis` feature at runtime
    Redis { url: String },
}

/// Per-route adjustment. Omitted fields fall back to the global values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteOverride {
    pub requests_per_minute: Option<u32>,
    pub burst_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLimit {
    pub pattern: String,
    /// `None` disables limiting for matching routes
    pub limit: Option<RouteOverride>,
}

impl RouteLimit {
    #[must_use]
    pub fn new(pattern: impl Into<String>, limit: RouteOverride) -> Self {
        Self {
            pattern: pattern.into(),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn unlimited(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
    pub backend: RateLimitBackend,
    pub redis_key_prefix: String,
    /// Longest matching pattern wins
    pub route_limits: Vec<RouteLimit>,
    pub include_headers: bool,
    /// Admit requests when the backend errors or times out
    pub fail_open: bool,
    pub backend_timeout: Duration,
    pub api_key_header: String,
    pub trust_proxy_headers: bool,
    pub max_entries: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 100,
            burst_size: 20,
            backend: RateLimitBackend::Memory,
            redis_key_prefix: "authgate:rl:".to_string(),
            route_limits: Vec::new(),
            include_headers: true,
            fail_open: true,
            backend_timeout: Duration::from_secs(5),
            api_key_header: API_KEY_HEADER.to_string(),
            trust_proxy_headers: false,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Self {
        Self {
            requests_per_minute,
            burst_size,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_route(mut self, route: RouteLimit) -> Self {
        self.route_limits.push(route);
        self
    }

    #[must_use]
    pub const fn fail_closed(mut self) -> Self {
        self.fail_open = false;
        self
    }

    #[must_use]
    pub fn with_redis(mut self, url: impl Into<String>) -> Self {
        self.backend = RateLimitBackend::Redis { url: url.into() };
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.requests_per_minute == 0 {
            return Err(Error::Config("requests_per_minute must be positive".into()));
        }
        for route in &self.route_limits {
            if route.limit.and_then(|l| l.requests_per_minute) == Some(0) {
                return Err(Error::Config(format!(
                    "requests_per_minute for route '{}' must be positive",
                    route.pattern
                )));
            }
        }
        if let RateLimitBackend::Redis { url } = &self.backend
            && url.trim().is_empty()
        {
            return Err(Error::Config("redis_url required for the redis backend".into()));
        }
        if self.backend_timeout.is_zero() {
            return Err(Error::Config("backend_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Bucket for `path`, or `None` when limiting is disabled there
    pub fn limit_for(&self, path: &str) -> Option<BucketLimit> {
        let route = crate::pattern::longest_match(
            self.route_limits
                .iter()
                .map(|r| (r.pattern.as_str(), r.limit)),
            path,
        );

        match route {
            Some(None) => None,
            Some(Some(o)) => Some(BucketLimit::new(
                o.requests_per_minute.unwrap_or(self.requests_per_minute),
                o.burst_size.unwrap_or(self.burst_size),
            )),
            None => Some(BucketLimit::new(self.requests_per_minute, self.burst_size)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.requests_per_minute, 100);
        assert_eq!(config.burst_size, 20);
        assert!(config.fail_open);
        assert!(config.include_headers);
        assert_eq!(config.backend_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(RateLimitConfig::new(0, 0).validate().is_err());
        assert!(RateLimitConfig::default().with_redis("  ").validate().is_err());
        assert!(
            RateLimitConfig::default()
                .with_route(RouteLimit::new(
                    "/x",
                    RouteOverride {
                        requests_per_minute: Some(0),
                        burst_size: None
                    }
                ))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_route_overrides_longest_match() {
        let config = RateLimitConfig::new(100, 20)
            .with_route(RouteLimit::new(
                "/api/*",
                RouteOverride {
                    requests_per_minute: Some(50),
                    burst_size: None,
                },
            ))
            .with_route(RouteLimit::new(
                "/api/chat/*",
                RouteOverride {
                    requests_per_minute: Some(30),
                    burst_size: Some(0),
                },
            ))
            .with_route(RouteLimit::unlimited("/health"));

        assert_eq!(config.limit_for("/api/chat/send"), Some(BucketLimit::new(30, 0)));
        assert_eq!(config.limit_for("/api/users"), Some(BucketLimit::new(50, 20)));
        assert_eq!(config.limit_for("/other"), Some(BucketLimit::new(100, 20)));
        assert!(config.limit_for("/health").is_none());
    }
}
