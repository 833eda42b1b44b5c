//! Structured request auditing with redaction and pluggable backends

mod backend;
mod config;
mod error;
mod record;
mod recorder;
mod redact;

pub use backend::{
    AuditBackend, CallbackAuditBackend, DEFAULT_MEMORY_CAPACITY, FileAuditBackend,
    LogAuditBackend, MemoryAuditBackend,
};
pub use config::{AuditBackendConfig, AuditConfig};
pub use error::AuditBackendError;
pub use record::{AuditRecord, ResponseSummary};
pub use recorder::AuditRecorder;
pub use redact::Redactor;
