use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::AuditBackend;
use crate::audit::error::AuditBackendError;
use crate::audit::record::AuditRecord;

/// Append-only JSON Lines file
#[derive(Debug)]
pub struct FileAuditBackend {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditBackend {
    /// Open for appending, creating the file and its parent directory if needed
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::info!(path = %path.display(), "Audit log file opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditBackend for FileAuditBackend {
    async fn store(&self, record: &AuditRecord) -> Result<(), AuditBackendError> {
        let line = record.to_json_line()?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
