//! Audit backend failures. Logged and discarded by the recorder.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditBackendError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit callback failed: {0}")]
    Callback(String),
}
