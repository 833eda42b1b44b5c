use std::sync::Arc;

use super::AuthPipeline;
use super::config::{PipelineConfig, validate_dependencies};
use crate::Result;
use crate::audit::AuditRecorder;
use crate::auth::TokenVerifier;
use crate::rate_limit::RateLimiter;
use crate::rbac::PermissionResolver;
use crate::tenant::TenantResolver;

/// Collects pipeline stages. Any subset may be given; ordering is fixed by the pipeline.
#[derive(Debug, Default)]
pub struct AuthPipelineBuilder {
    verifier: Option<Arc<TokenVerifier>>,
    permissions: Option<Arc<PermissionResolver>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    tenants: Option<Arc<TenantResolver>>,
    audit: Option<Arc<AuditRecorder>>,
}

impl AuthPipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct every stage named in `config`.
    ///
    /// Stages can still be replaced before [`build`](Self::build), e.g. to attach
    /// a tenant store to the resolver.
    pub async fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Self::new();
        if let Some(jwt) = config.jwt {
            builder = builder.jwt(TokenVerifier::new(jwt)?);
        }
        if let Some(rbac) = config.rbac {
            builder = builder.rbac(PermissionResolver::new(rbac)?);
        }
        if let Some(rate_limit) = config.rate_limit {
            builder = builder.rate_limit(RateLimiter::connect(rate_limit).await?);
        }
        if let Some(tenant) = config.tenant {
            builder = builder.tenant(TenantResolver::new(tenant));
        }
        if let Some(audit) = config.audit {
            builder = builder.audit(AuditRecorder::from_config(audit).await?);
        }
        Ok(builder)
    }

    #[must_use]
    pub fn jwt(mut self, verifier: impl Into<Arc<TokenVerifier>>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    #[must_use]
    pub fn rbac(mut self, resolver: impl Into<Arc<PermissionResolver>>) -> Self {
        self.permissions = Some(resolver.into());
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, limiter: impl Into<Arc<RateLimiter>>) -> Self {
        self.rate_limiter = Some(limiter.into());
        self
    }

    #[must_use]
    pub fn tenant(mut self, resolver: impl Into<Arc<TenantResolver>>) -> Self {
        self.tenants = Some(resolver.into());
        self
    }

    #[must_use]
    pub fn audit(mut self, recorder: impl Into<Arc<AuditRecorder>>) -> Self {
        self.audit = Some(recorder.into());
        self
    }

    /// Fails with [`Error::MissingDependency`](crate::Error::MissingDependency)
    /// if RBAC or tenant resolution is configured without token verification.
    pub fn build(self) -> Result<AuthPipeline> {
        validate_dependencies(
            self.verifier.is_some(),
            self.permissions.is_some(),
            self.tenants.is_some(),
        )?;

        let pipeline = AuthPipeline {
            verifier: self.verifier,
            permissions: self.permissions,
            rate_limiter: self.rate_limiter,
            tenants: self.tenants,
            audit: self.audit,
        };
        tracing::info!(components = ?pipeline.enabled_components(), "Auth pipeline built");
        Ok(pipeline)
    }
}
