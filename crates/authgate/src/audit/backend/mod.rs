//! Audit storage backends

mod callback;
mod file;
mod log;
mod memory;

use async_trait::async_trait;

pub use callback::CallbackAuditBackend;
pub use file::FileAuditBackend;
pub use log::LogAuditBackend;
pub use memory::{DEFAULT_MEMORY_CAPACITY, MemoryAuditBackend};

use super::error::AuditBackendError;
use super::record::AuditRecord;

/// Destination for audit records
#[async_trait]
pub trait AuditBackend: Send + Sync {
    async fn store(&self, record: &AuditRecord) -> Result<(), AuditBackendError>;

    fn name(&self) -> &'static str;
}
