use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::AuditBackend;
use crate::audit::error::AuditBackendError;
use crate::audit::record::AuditRecord;

type Callback = dyn Fn(AuditRecord) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Hands each record to a user closure
#[derive(Clone)]
pub struct CallbackAuditBackend {
    callback: Arc<Callback>,
}

impl std::fmt::Debug for CallbackAuditBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackAuditBackend").finish_non_exhaustive()
    }
}

impl CallbackAuditBackend {
    /// Async callback
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(AuditRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |record| Box::pin(callback(record))),
        }
    }

    /// Synchronous callback
    pub fn blocking<F>(callback: F) -> Self
    where
        F: Fn(AuditRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        Self::new(move |record| {
            let callback = Arc::clone(&callback);
            async move { callback(record) }
        })
    }
}

#[async_trait]
impl AuditBackend for CallbackAuditBackend {
    async fn store(&self, record: &AuditRecord) -> Result<(), AuditBackendError> {
        (self.callback)(record.clone())
            .await
            .map_err(|e| AuditBackendError::Callback(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "callback"
    }
}
