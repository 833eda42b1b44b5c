//! Declarative pipeline description and presets

use crate::audit::AuditConfig;
use crate::auth::JwtConfig;
use crate::rate_limit::RateLimitConfig;
use crate::rbac::RbacConfig;
use crate::tenant::TenantConfig;
use crate::{Error, Result};

/// Which stages to build, and how. `None` leaves a stage out.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub jwt: Option<JwtConfig>,
    pub rbac: Option<RbacConfig>,
    pub rate_limit: Option<RateLimitConfig>,
    pub tenant: Option<TenantConfig>,
    pub audit: Option<AuditConfig>,
}

impl PipelineConfig {
    /// Token verification with log auditing
    #[must_use]
    pub fn basic(jwt: JwtConfig) -> Self {
        Self {
            jwt: Some(jwt),
            audit: Some(AuditConfig::default()),
            ..Default::default()
        }
    }

    /// Multi-tenant application: verification, roles, tenants and log auditing
    #[must_use]
    pub fn saas(jwt: JwtConfig, rbac: RbacConfig, tenant: TenantConfig) -> Self {
        Self {
            jwt: Some(jwt),
            rbac: Some(rbac),
            tenant: Some(tenant),
            audit: Some(AuditConfig::default()),
            ..Default::default()
        }
    }

    /// Every stage
    #[must_use]
    pub fn enterprise(
        jwt: JwtConfig,
        rbac: RbacConfig,
        rate_limit: RateLimitConfig,
        tenant: TenantConfig,
        audit: AuditConfig,
    ) -> Self {
        Self {
            jwt: Some(jwt),
            rbac: Some(rbac),
            rate_limit: Some(rate_limit),
            tenant: Some(tenant),
            audit: Some(audit),
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    #[must_use]
    pub fn without_audit(mut self) -> Self {
        self.audit = None;
        self
    }

    /// Stage dependencies: RBAC and tenant resolution need an identity
    pub fn validate(&self) -> Result<()> {
        validate_dependencies(
            self.jwt.is_some(),
            self.rbac.is_some(),
            self.tenant.is_some(),
        )
    }

    pub fn enabled_components(&self) -> Vec<&'static str> {
        component_names(
            self.jwt.is_some(),
            self.rbac.is_some(),
            self.rate_limit.is_some(),
            self.tenant.is_some(),
            self.audit.is_some(),
        )
    }
}

pub(super) fn validate_dependencies(jwt: bool, rbac: bool, tenant: bool) -> Result<()> {
    if rbac && !jwt {
        return Err(Error::MissingDependency {
            component: "RBAC",
            requires: "JWT verification",
        });
    }
    if tenant && !jwt {
        return Err(Error::MissingDependency {
            component: "Tenant isolation",
            requires: "JWT verification",
        });
    }
    Ok(())
}

pub(super) fn component_names(
    jwt: bool,
    rbac: bool,
    rate_limit: bool,
    tenant: bool,
    audit: bool,
) -> Vec<&'static str> {
    [
        (jwt, "jwt"),
        (rbac, "rbac"),
        (rate_limit, "rate_limit"),
        (tenant, "tenant"),
        (audit, "audit"),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_presets() {
        let basic = PipelineConfig::basic(JwtConfig::hmac(SECRET));
        assert_eq!(basic.enabled_components(), ["jwt", "audit"]);

        let saas = PipelineConfig::saas(
            JwtConfig::hmac(SECRET),
            RbacConfig::default(),
            TenantConfig::default(),
        );
        assert_eq!(saas.enabled_components(), ["jwt", "rbac", "tenant", "audit"]);

        let enterprise = PipelineConfig::enterprise(
            JwtConfig::hmac(SECRET),
            RbacConfig::default(),
            RateLimitConfig::default(),
            TenantConfig::default(),
            AuditConfig::default(),
        );
        assert_eq!(enterprise.enabled_components().len(), 5);
        assert!(enterprise.validate().is_ok());
    }

    #[test]
    fn test_rbac_requires_jwt() {
        let config = PipelineConfig {
            rbac: Some(RbacConfig::default()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().starts_with("RBAC requires JWT"));
    }

    #[test]
    fn test_tenant_requires_jwt() {
        let config = PipelineConfig {
            tenant: Some(TenantConfig::default()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::MissingDependency {
                component: "Tenant isolation",
                ..
            })
        ));
    }
}
