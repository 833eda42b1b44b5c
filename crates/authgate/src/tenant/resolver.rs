//! Tenant resolution priority chain

use std::sync::Arc;

use super::config::TenantConfig;
use super::error::TenantError;
use super::store::{CustomTenantResolver, TenantInfo, TenantStore, UserDirectory};
use crate::auth::Identity;
use crate::context::RequestSnapshot;
use crate::pattern;

type Result<T> = std::result::Result<T, TenantError>;

/// Where a tenant candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Header,
    Claim,
    UserOrg,
    Custom,
}

impl Source {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Claim => "claim",
            Self::UserOrg => "user_org",
            Self::Custom => "custom",
        }
    }
}

/// Determines the active tenant: override header, token claim, user
/// organization, then a custom resolver. The first candidate found is final.
#[derive(Default)]
pub struct TenantResolver {
    config: TenantConfig,
    store: Option<Arc<dyn TenantStore>>,
    directory: Option<Arc<dyn UserDirectory>>,
    custom: Option<Arc<dyn CustomTenantResolver>>,
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantResolver")
            .field("config", &self.config)
            .field("has_store", &self.store.is_some())
            .field("has_directory", &self.directory.is_some())
            .field("has_custom", &self.custom.is_some())
            .finish()
    }
}

impl TenantResolver {
    #[must_use]
    pub fn new(config: TenantConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TenantStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_user_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_custom_resolver(mut self, resolver: Arc<dyn CustomTenantResolver>) -> Self {
        self.custom = Some(resolver);
        self
    }

    pub const fn config(&self) -> &TenantConfig {
        &self.config
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        pattern::matches_any(&self.config.exclude_paths, path)
    }

    /// Resolve the tenant for a request. `Ok(None)` means no tenant applies.
    pub async fn resolve(
        &self,
        request: &RequestSnapshot,
        identity: Option<&Identity>,
    ) -> Result<Option<TenantInfo>> {
        if !self.config.enabled || self.is_excluded(&request.path) {
            return Ok(None);
        }

        let Some((tenant_id, source)) = self.candidate(request, identity).await? else {
            return Ok(None);
        };

        let tenant = self.validate(&tenant_id).await?;
        tracing::debug!(tenant_id = %tenant.tenant_id, source = source.as_str(), "Tenant resolved");
        Ok(Some(tenant))
    }

    async fn candidate(
        &self,
        request: &RequestSnapshot,
        identity: Option<&Identity>,
    ) -> Result<Option<(String, Source)>> {
        if let Some(requested) = request
            .header(&self.config.header)
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            self.authorize_override(requested, identity)?;
            return Ok(Some((requested.to_string(), Source::Header)));
        }

        if let Some(identity) = identity {
            let claimed = identity
                .claim_str(&self.config.jwt_claim)
                .or_else(|| identity.tenant_claim.clone());
            if let Some(tenant_id) = claimed {
                return Ok(Some((tenant_id, Source::Claim)));
            }

            if self.config.fallback_to_user_org
                && let Some(org) = self.user_org(identity).await
            {
                return Ok(Some((org, Source::UserOrg)));
            }
        }

        if let Some(custom) = &self.custom {
            match custom.resolve_tenant(request, identity).await {
                Ok(Some(tenant_id)) => return Ok(Some((tenant_id, Source::Custom))),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Custom tenant resolver failed");
                    return Err(TenantError::access_denied(None, "Tenant could not be resolved"));
                }
            }
        }

        Ok(None)
    }

    /// The override header is honoured only for holders of the admin role
    fn authorize_override(&self, requested: &str, identity: Option<&Identity>) -> Result<()> {
        if !self.config.allow_admin_override {
            tracing::warn!(tenant_id = %requested, "Tenant override header sent while overrides are disabled");
            return Err(TenantError::access_denied(
                Some(requested),
                "Admin tenant override is disabled",
            ));
        }

        if !identity.is_some_and(|i| i.has_role(&self.config.admin_role)) {
            tracing::warn!(
                user_id = identity.map_or("unknown", |i| i.subject_id.as_str()),
                tenant_id = %requested,
                "Non-admin tenant override attempt"
            );
            return Err(TenantError::access_denied(
                Some(requested),
                format!(
                    "Tenant override header requires '{}' role",
                    self.config.admin_role
                ),
            ));
        }

        Ok(())
    }

    async fn user_org(&self, identity: &Identity) -> Option<String> {
        match &self.directory {
            Some(directory) => match directory.organization_of(identity).await {
                Ok(org) => org,
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %identity.subject_id, "User directory lookup failed");
                    None
                }
            },
            None => identity.claim_str(&self.config.org_field_name),
        }
    }

    /// Existence and activity checks. Without a store, existence checks fail closed.
    async fn validate(&self, tenant_id: &str) -> Result<TenantInfo> {
        if !self.config.validate_exists {
            return Ok(TenantInfo::new(tenant_id));
        }

        let not_found = || TenantError::NotFound {
            tenant_id: tenant_id.to_string(),
        };

        let Some(store) = &self.store else {
            tracing::warn!(
                tenant_id,
                "Tenant validation enabled without a tenant store; rejecting"
            );
            return Err(not_found());
        };

        let tenant = match store.get_tenant(tenant_id).await {
            Ok(Some(tenant)) => tenant,
            Ok(None) => return Err(not_found()),
            Err(e) => {
                tracing::error!(error = %e, tenant_id, "Tenant store lookup failed");
                return Err(not_found());
            }
        };

        if self.config.validate_active && !tenant.active {
            return Err(TenantError::Inactive {
                tenant_id: tenant_id.to_string(),
            });
        }

        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http::Method;
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::tenant::InMemoryTenantStore;

    fn identity(claims: Value) -> Identity {
        let map: Map<String, Value> = serde_json::from_value(claims).unwrap();
        Identity::from_claims(map, "tenant_id").unwrap()
    }

    fn store() -> Arc<InMemoryTenantStore> {
        let store = InMemoryTenantStore::new();
        store.register(TenantInfo::new("acme"));
        store.register(TenantInfo::new("globex"));
        store.register(TenantInfo::new("initech").inactive());
        Arc::new(store)
    }

    fn resolver() -> TenantResolver {
        TenantResolver::new(TenantConfig::default()).with_store(store())
    }

    fn get(path: &str) -> RequestSnapshot {
        RequestSnapshot::new(Method::GET, path)
    }

    #[tokio::test]
    async fn test_claim_resolution() {
        let user = identity(json!({ "sub": "u", "tenant_id": "acme" }));
        let tenant = resolver().resolve(&get("/api"), Some(&user)).await.unwrap().unwrap();
        assert_eq!(tenant.tenant_id, "acme");
    }

    #[tokio::test]
    async fn test_override_requires_admin_role() {
        let user = identity(json!({ "sub": "u", "tenant_id": "acme" }));
        let request = get("/api").with_header("x-tenant-id", "globex");

        let err = resolver().resolve(&request, Some(&user)).await.unwrap_err();
        assert!(matches!(err, TenantError::AccessDenied { .. }));
        assert!(err.public_detail().contains("super_admin"));

        let err = resolver().resolve(&request, None).await.unwrap_err();
        assert!(matches!(err, TenantError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_admin_override_wins_over_claim() {
        let admin = identity(json!({ "sub": "a", "roles": ["super_admin"], "tenant_id": "acme" }));
        let request = get("/api").with_header("x-tenant-id", "globex");

        let tenant = resolver().resolve(&request, Some(&admin)).await.unwrap().unwrap();
        assert_eq!(tenant.tenant_id, "globex");
    }

    #[tokio::test]
    async fn test_override_disabled_rejects_even_admins() {
        let resolver = TenantResolver::new(TenantConfig::default().with_admin_override(false))
            .with_store(store());
        let admin = identity(json!({ "sub": "a", "roles": ["super_admin"] }));
        let request = get("/api").with_header("x-tenant-id", "globex");

        let err = resolver.resolve(&request, Some(&admin)).await.unwrap_err();
        assert_eq!(err.public_detail(), "Admin tenant override is disabled");
    }

    #[tokio::test]
    async fn test_first_candidate_is_final() {
        let user = identity(json!({ "sub": "u", "tenant_id": "unknown", "organization_id": "acme" }));
        let err = resolver().resolve(&get("/api"), Some(&user)).await.unwrap_err();
        assert!(matches!(err, TenantError::NotFound { ref tenant_id } if tenant_id == "unknown"));
    }

    #[tokio::test]
    async fn test_user_org_fallback_from_claims() {
        let user = identity(json!({ "sub": "u", "organization_id": "globex" }));
        let tenant = resolver().resolve(&get("/api"), Some(&user)).await.unwrap().unwrap();
        assert_eq!(tenant.tenant_id, "globex");
    }

    struct Directory;

    #[async_trait]
    impl UserDirectory for Directory {
        async fn organization_of(&self, identity: &Identity) -> anyhow::Result<Option<String>> {
            Ok((identity.subject_id == "u").then(|| "globex".to_string()))
        }
    }

    #[tokio::test]
    async fn test_user_directory_lookup() {
        let resolver = resolver().with_user_directory(Arc::new(Directory));
        let user = identity(json!({ "sub": "u" }));
        let tenant = resolver.resolve(&get("/api"), Some(&user)).await.unwrap().unwrap();
        assert_eq!(tenant.tenant_id, "globex");
    }

    struct SubdomainResolver;

    #[async_trait]
    impl CustomTenantResolver for SubdomainResolver {
        async fn resolve_tenant(
            &self,
            request: &RequestSnapshot,
            _identity: Option<&Identity>,
        ) -> anyhow::Result<Option<String>> {
            Ok(request
                .header("host")
                .and_then(|host| host.split('.').next())
                .map(String::from))
        }
    }

    #[tokio::test]
    async fn test_custom_resolver_evaluated_last() {
        let resolver = resolver().with_custom_resolver(Arc::new(SubdomainResolver));
        let request = get("/api").with_header("host", "globex.example.com");

        let user = identity(json!({ "sub": "u", "tenant_id": "acme" }));
        let tenant = resolver.resolve(&request, Some(&user)).await.unwrap().unwrap();
        assert_eq!(tenant.tenant_id, "acme");

        let tenant = resolver.resolve(&request, None).await.unwrap().unwrap();
        assert_eq!(tenant.tenant_id, "globex");
    }

    #[tokio::test]
    async fn test_inactive_tenant() {
        let user = identity(json!({ "sub": "u", "tenant_id": "initech" }));
        let err = resolver().resolve(&get("/api"), Some(&user)).await.unwrap_err();
        assert!(matches!(err, TenantError::Inactive { .. }));
    }

    #[tokio::test]
    async fn test_missing_store_fails_closed() {
        let resolver = TenantResolver::new(TenantConfig::default());
        let user = identity(json!({ "sub": "u", "tenant_id": "acme" }));
        let err = resolver.resolve(&get("/api"), Some(&user)).await.unwrap_err();
        assert!(matches!(err, TenantError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_validation_disabled_accepts_any_id() {
        let resolver = TenantResolver::new(TenantConfig::default().without_validation());
        let user = identity(json!({ "sub": "u", "tenant_id": "anything" }));
        let tenant = resolver.resolve(&get("/api"), Some(&user)).await.unwrap().unwrap();
        assert_eq!(tenant.tenant_id, "anything");
        assert!(tenant.active);
    }

    #[tokio::test]
    async fn test_no_candidate_and_excluded_paths() {
        let user = identity(json!({ "sub": "u" }));
        assert!(resolver().resolve(&get("/api"), Some(&user)).await.unwrap().is_none());

        let request = get("/health").with_header("x-tenant-id", "globex");
        assert!(resolver().resolve(&request, None).await.unwrap().is_none());
    }
}
