//! Token bucket admission with route overrides and a backend failure policy

use std::sync::Arc;

use super::config::{RateLimitBackend, RateLimitConfig};
use super::decision::RateLimitDecision;
use super::error::RateLimitError;
use super::memory::MemoryRateLimitStore;
use super::store::RateLimitStore;
use crate::auth::Identity;
use crate::constants::API_KEY_PREFIX_LEN;
use crate::context::RequestSnapshot;
use crate::{Error, Result};

pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("store", &self.store.name())
            .finish()
    }
}

impl RateLimiter {
    /// In-memory limiter. Use [`RateLimiter::connect`] for shared backends.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        if !matches!(config.backend, RateLimitBackend::Memory) {
            return Err(Error::Config(
                "Shared rate limit backends must be created with RateLimiter::connect".into(),
            ));
        }
        let store = Arc::new(MemoryRateLimitStore::new(config.max_entries));
        Ok(Self { config, store })
    }

    /// Build the configured backend, connecting to it if needed
    pub async fn connect(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn RateLimitStore> = match &config.backend {
            RateLimitBackend::Memory => Arc::new(MemoryRateLimitStore::new(config.max_entries)),
            #[cfg(feature = "redis")]
            RateLimitBackend::Redis { url } => Arc::new(
                super::redis::RedisRateLimitStore::connect(url, config.redis_key_prefix.clone())
                    .await?,
            ),
            #[cfg(not(feature = "redis"))]
            RateLimitBackend::Redis { .. } => {
                return Err(Error::Config(
                    "Redis rate limiting requires the `redis` feature".into(),
                ));
            }
        };
        Ok(Self { config, store })
    }

    /// Limiter over a caller-supplied store
    pub fn with_store(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub const fn include_headers(&self) -> bool {
        self.config.include_headers
    }

    /// `user:{id}`, else `apikey:{prefix}`, else `ip:{addr}`
    pub fn identifier(&self, request: &RequestSnapshot, identity: Option<&Identity>) -> String {
        if let Some(identity) = identity {
            return format!("user:{}", identity.subject_id);
        }

        if let Some(key) = request
            .header(&self.config.api_key_header)
            .filter(|k| !k.is_empty())
        {
            let prefix: String = key.chars().take(API_KEY_PREFIX_LEN).collect();
            return format!("apikey:{prefix}");
        }

        let ip = request
            .client_ip(self.config.trust_proxy_headers)
            .unwrap_or_else(|| "unknown".to_string());
        format!("ip:{ip}")
    }

    /// Take one token for `identifier` on `route`.
    ///
    /// `Ok(None)` means limiting does not apply: the route is unlimited or the
    /// backend failed while failing open. A denial is a decision with
    /// `allowed == false`, not an error.
    pub async fn admit(
        &self,
        identifier: &str,
        route: &str,
    ) -> std::result::Result<Option<RateLimitDecision>, RateLimitError> {
        let Some(limit) = self.config.limit_for(route) else {
            return Ok(None);
        };

        let outcome =
            tokio::time::timeout(self.config.backend_timeout, self.store.acquire(identifier, &limit))
                .await
                .unwrap_or_else(|_| Err(RateLimitError::Timeout(self.config.backend_timeout)));

        match outcome {
            Ok(acquired) => Ok(Some(RateLimitDecision::from_bucket(
                identifier,
                &limit,
                acquired,
                chrono::Utc::now().timestamp(),
            ))),
            Err(e) => {
                #[cfg(feature = "metrics")]
                crate::observability::record_rate_limit_backend_error(self.store.name());

                if self.config.fail_open {
                    tracing::warn!(error = %e, backend = self.store.name(), "Rate limit backend failed, admitting request");
                    Ok(None)
                } else {
                    tracing::error!(error = %e, backend = self.store.name(), "Rate limit backend failed, rejecting request");
                    Err(e)
                }
            }
        }
    }

    /// Admit a request, turning a denial into [`RateLimitError::Exceeded`]
    pub async fn check(
        &self,
        request: &RequestSnapshot,
        identity: Option<&Identity>,
    ) -> std::result::Result<Option<RateLimitDecision>, RateLimitError> {
        let identifier = self.identifier(request, identity);
        let decision = self.admit(&identifier, &request.path).await?;

        match decision {
            Some(decision) if !decision.allowed => {
                let retry_after = decision.retry_after.unwrap_or(1);
                tracing::warn!(
                    identifier = %decision.identifier,
                    path = %request.path,
                    retry_after,
                    "Rate limit exceeded"
                );
                #[cfg(feature = "metrics")]
                crate::observability::record_rate_limited();
                Err(RateLimitError::Exceeded {
                    retry_after,
                    decision,
                })
            }
            other => Ok(other),
        }
    }

    pub async fn reset(&self, identifier: &str) -> std::result::Result<(), RateLimitError> {
        self.store.reset(identifier).await
    }
}
