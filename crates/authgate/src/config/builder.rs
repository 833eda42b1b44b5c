//! Configuration builder

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use url::Url;

use crate::audit::AuditConfig;
use crate::auth::{JwtConfig, SigningAlgorithm};
use crate::pipeline::PipelineConfig;
use crate::rate_limit::{RateLimitBackend, RateLimitConfig};
use crate::rbac::RbacConfig;
use crate::tenant::TenantConfig;
use crate::{Error, Result};

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// HTTP listener settings for the demo binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Configuration builder with fluent API
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    server: ServerConfig,
    logging: LoggingConfig,
    jwt: Option<JwtConfig>,
    rbac: Option<RbacConfig>,
    tenant: Option<TenantConfig>,
    rate_limit: Option<RateLimitConfig>,
    audit: Option<AuditConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.server.host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.server.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.log_level = level.into();
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.logging.json_logs = enabled;
        self
    }

    #[must_use]
    pub fn jwt(mut self, config: JwtConfig) -> Self {
        self.jwt = Some(config);
        self
    }

    /// Set the HMAC secret, enabling token verification if needed
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_mut().secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn jwt_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.jwt_mut().algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn jwt_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.jwt_mut().issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn jwks_uri(mut self, uri: Url) -> Self {
        self.jwt_mut().jwks_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn rbac(mut self, config: RbacConfig) -> Self {
        self.rbac = Some(config);
        self
    }

    #[must_use]
    pub fn tenant(mut self, config: TenantConfig) -> Self {
        self.tenant = Some(config);
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    /// Switch rate limiting to the shared store, enabling it with defaults if needed
    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.rate_limit.get_or_insert_with(RateLimitConfig::default).backend =
            RateLimitBackend::Redis { url: url.into() };
        self
    }

    #[must_use]
    pub fn audit(mut self, config: AuditConfig) -> Self {
        self.audit = Some(config);
        self
    }

    fn jwt_mut(&mut self) -> &mut JwtConfig {
        self.jwt.get_or_insert_with(JwtConfig::default)
    }

    /// Validate and assemble. Any error here should stop startup.
    pub fn build(self) -> Result<AppConfig> {
        if let Some(jwt) = &self.jwt {
            jwt.validate()?;
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        if self.server.request_timeout.is_zero() {
            return Err(Error::Config("request_timeout must be non-zero".into()));
        }

        let pipeline = PipelineConfig {
            jwt: self.jwt,
            rbac: self.rbac,
            rate_limit: self.rate_limit,
            tenant: self.tenant,
            audit: self.audit,
        };
        pipeline.validate()?;

        Ok(AppConfig {
            server: self.server,
            logging: self.logging,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.log_level, "info");
        assert!(config.pipeline.enabled_components().is_empty());
    }

    #[test]
    fn test_jwt_secret_enables_verification() {
        let config = ConfigBuilder::new()
            .jwt_secret(SECRET)
            .jwt_issuer("https://auth.local")
            .build()
            .unwrap();
        let jwt = config.pipeline.jwt.unwrap();
        assert_eq!(jwt.algorithm, SigningAlgorithm::HS256);
        assert_eq!(jwt.issuer.as_deref(), Some("https://auth.local"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = ConfigBuilder::new().jwt_secret("short").build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_redis_url_enables_rate_limiting() {
        let config = ConfigBuilder::new()
            .redis_url("redis://127.0.0.1:6379")
            .build()
            .unwrap();
        assert_eq!(
            config.pipeline.rate_limit.unwrap().backend,
            RateLimitBackend::Redis {
                url: "redis://127.0.0.1:6379".into()
            }
        );
    }

    #[test]
    fn test_rbac_without_jwt_fails() {
        let err = ConfigBuilder::new()
            .rbac(RbacConfig::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingDependency { .. }));
    }
}
