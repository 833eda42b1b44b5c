//! Tenant resolution settings

use crate::constants::TENANT_HEADER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub enabled: bool,
    /// Admin override header
    pub header: String,
    /// Claim consulted before the identity's normalized tenant hint
    pub jwt_claim: String,
    pub fallback_to_user_org: bool,
    pub org_field_name: String,
    pub validate_exists: bool,
    pub validate_active: bool,
    pub allow_admin_override: bool,
    pub admin_role: String,
    pub exclude_paths: Vec<String>,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header: TENANT_HEADER.to_string(),
            jwt_claim: "tenant_id".to_string(),
            fallback_to_user_org: true,
            org_field_name: "organization_id".to_string(),
            validate_exists: true,
            validate_active: true,
            allow_admin_override: true,
            admin_role: "super_admin".to_string(),
            exclude_paths: ["/health", "/metrics", "/docs", "/openapi.json"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl TenantConfig {
    /// Accept any tenant id without consulting a store
    #[must_use]
    pub fn without_validation(mut self) -> Self {
        self.validate_exists = false;
        self.validate_active = false;
        self
    }

    #[must_use]
    pub fn with_admin_role(mut self, role: impl Into<String>) -> Self {
        self.admin_role = role.into();
        self
    }

    #[must_use]
    pub const fn with_admin_override(mut self, allowed: bool) -> Self {
        self.allow_admin_override = allowed;
        self
    }
}
