//! Task-local tenant propagation

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::store::TenantInfo;

tokio::task_local! {
    static CURRENT_TENANT: Option<Arc<TenantInfo>>;
}

/// Tenant of the enclosing pipeline scope, if any
pub fn current_tenant() -> Option<Arc<TenantInfo>> {
    CURRENT_TENANT.try_with(Clone::clone).ok().flatten()
}

/// Run `fut` with `tenant` visible through [`current_tenant`]
pub async fn with_tenant<F: Future>(tenant: Option<Arc<TenantInfo>>, fut: F) -> F::Output {
    CURRENT_TENANT.scope(tenant, fut).await
}

/// `tokio::spawn` carrying the caller's tenant into the new task
pub fn spawn_with_tenant<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let tenant = current_tenant();
    tokio::spawn(CURRENT_TENANT.scope(tenant, fut))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_scope_means_no_tenant() {
        assert!(current_tenant().is_none());
    }

    #[tokio::test]
    async fn test_scope_and_spawn_propagation() {
        let tenant = Arc::new(TenantInfo::new("acme"));

        let seen = with_tenant(Some(tenant), async {
            let inner = current_tenant().map(|t| t.tenant_id.clone());
            let spawned = spawn_with_tenant(async { current_tenant().map(|t| t.tenant_id.clone()) })
                .await
                .unwrap();
            let plain = tokio::spawn(async { current_tenant().is_some() }).await.unwrap();
            (inner, spawned, plain)
        })
        .await;

        assert_eq!(seen.0.as_deref(), Some("acme"));
        assert_eq!(seen.1.as_deref(), Some("acme"));
        assert!(!seen.2);
        assert!(current_tenant().is_none());
    }
}
