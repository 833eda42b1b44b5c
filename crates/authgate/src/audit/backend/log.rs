use async_trait::async_trait;
use tracing::Level;

use super::AuditBackend;
use crate::audit::error::AuditBackendError;
use crate::audit::record::AuditRecord;

macro_rules! audit_event {
    ($level:expr, $record:expr) => {
        tracing::event!(
            target: "authgate::audit",
            $level,
            id = %$record.id,
            method = %$record.method,
            path = %$record.path,
            status = $record.status_code,
            duration_ms = $record.duration_ms,
            ip = %$record.ip_address,
            user_id = $record.user_id.as_deref(),
            tenant_id = $record.tenant_id.as_deref(),
            error = $record.error.as_deref(),
            "audit"
        )
    };
}

/// Emits one `tracing` event per record under the `authgate::audit` target
#[derive(Debug, Clone, Copy)]
pub struct LogAuditBackend {
    level: Level,
}

impl Default for LogAuditBackend {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LogAuditBackend {
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// 5xx at error, 4xx at warn, everything else at the configured level
    fn level_for(&self, status: u16) -> Level {
        match status {
            500.. => Level::ERROR,
            400..=499 => Level::WARN,
            _ => self.level,
        }
    }
}

#[async_trait]
impl AuditBackend for LogAuditBackend {
    async fn store(&self, record: &AuditRecord) -> Result<(), AuditBackendError> {
        match self.level_for(record.status_code) {
            Level::ERROR => audit_event!(Level::ERROR, record),
            Level::WARN => audit_event!(Level::WARN, record),
            Level::INFO => audit_event!(Level::INFO, record),
            Level::DEBUG => audit_event!(Level::DEBUG, record),
            _ => audit_event!(Level::TRACE, record),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_by_status() {
        let backend = LogAuditBackend::new(Level::DEBUG);
        assert_eq!(backend.level_for(503), Level::ERROR);
        assert_eq!(backend.level_for(429), Level::WARN);
        assert_eq!(backend.level_for(200), Level::DEBUG);
        assert_eq!(backend.level_for(302), Level::DEBUG);
    }
}
