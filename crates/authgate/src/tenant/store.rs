//! Tenant records and the pluggable lookups behind resolution

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::Identity;
use crate::context::RequestSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantInfo {
    pub tenant_id: String,
    pub name: Option<String>,
    pub active: bool,
    pub metadata: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TenantInfo {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: None,
            active: true,
            metadata: Map::new(),
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Source of truth for tenant existence and status
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<TenantInfo>>;
}

/// User-record organization lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn organization_of(&self, identity: &Identity) -> anyhow::Result<Option<String>>;
}

/// Last-resort tenant id source
#[async_trait]
pub trait CustomTenantResolver: Send + Sync {
    async fn resolve_tenant(
        &self,
        request: &RequestSnapshot,
        identity: Option<&Identity>,
    ) -> anyhow::Result<Option<String>>;
}

/// Process-local tenant registry
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<String, TenantInfo>>,
}

impl InMemoryTenantStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant, stamping `created_at` if unset
    pub fn register(&self, mut tenant: TenantInfo) {
        tenant.created_at.get_or_insert_with(Utc::now);
        tracing::debug!(tenant_id = %tenant.tenant_id, "Tenant registered");
        self.tenants.write().insert(tenant.tenant_id.clone(), tenant);
    }

    /// Returns false if the tenant is unknown
    pub fn deactivate(&self, tenant_id: &str) -> bool {
        self.tenants
            .write()
            .get_mut(tenant_id)
            .map(|tenant| tenant.active = false)
            .is_some()
    }

    pub fn activate(&self, tenant_id: &str) -> bool {
        self.tenants
            .write()
            .get_mut(tenant_id)
            .map(|tenant| tenant.active = true)
            .is_some()
    }

    pub fn remove(&self, tenant_id: &str) -> Option<TenantInfo> {
        self.tenants.write().remove(tenant_id)
    }

    pub fn get(&self, tenant_id: &str) -> Option<TenantInfo> {
        self.tenants.read().get(tenant_id).cloned()
    }

    pub fn tenant_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.tenants.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.read().is_empty()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<TenantInfo>> {
        Ok(self.get(tenant_id))
    }
}
