use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::AuditBackend;
use crate::audit::error::AuditBackendError;
use crate::audit::record::AuditRecord;

pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

/// Bounded in-process buffer; the oldest record is dropped when full
#[derive(Debug)]
pub struct MemoryAuditBackend {
    records: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl Default for MemoryAuditBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryAuditBackend {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<AuditRecord> {
        self.records.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[async_trait]
impl AuditBackend for MemoryAuditBackend {
    async fn store(&self, record: &AuditRecord) -> Result<(), AuditBackendError> {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;

    use super::*;

    fn record(path: &str) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            method: "GET".into(),
            path: path.into(),
            status_code: 200,
            duration_ms: 0.0,
            ip_address: "unknown".into(),
            user_agent: String::new(),
            user_id: None,
            tenant_id: None,
            request_body_size: 0,
            response_body_size: 0,
            error: None,
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_oldest_dropped_at_capacity() {
        let backend = MemoryAuditBackend::new(2);
        for path in ["/1", "/2", "/3"] {
            backend.store(&record(path)).await.unwrap();
        }
        let paths: Vec<_> = backend.records().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/2", "/3"]);

        backend.clear();
        assert!(backend.is_empty());
    }
}
