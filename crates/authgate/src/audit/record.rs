//! Structured audit record

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: f64,
    pub ip_address: String,
    pub user_agent: String,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub request_body_size: u64,
    pub response_body_size: u64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AuditRecord {
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// What the recorder needs to know about the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: StatusCode,
    pub body_size: u64,
    pub duration: Duration,
    /// Stable code of a pipeline rejection
    pub error_code: Option<&'static str>,
}

impl ResponseSummary {
    #[must_use]
    pub const fn new(status: StatusCode, duration: Duration) -> Self {
        Self {
            status,
            body_size: 0,
            duration,
            error_code: None,
        }
    }

    #[must_use]
    pub const fn with_body_size(mut self, size: u64) -> Self {
        self.body_size = size;
        self
    }

    #[must_use]
    pub const fn rejected(mut self, code: &'static str) -> Self {
        self.error_code = Some(code);
        self
    }

    /// Rejection code, or `HTTP {status}` for handler errors
    pub fn error(&self) -> Option<String> {
        self.error_code.map(String::from).or_else(|| {
            (self.status.as_u16() >= 400).then(|| format!("HTTP {}", self.status.as_u16()))
        })
    }
}
