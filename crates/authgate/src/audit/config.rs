//! Audit recorder settings

use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

use crate::constants::REDACTED;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuditBackendConfig {
    /// `tracing` events
    #[default]
    Log,
    /// Append-only JSON Lines file
    File { path: PathBuf },
    /// In-process buffer
    Memory { capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub enabled: bool,
    pub backend: AuditBackendConfig,
    /// Level for successful requests on the log backend
    pub log_level: Level,
    pub log_request_body: bool,
    pub max_body_log_size: usize,
    pub include_query_params: bool,
    pub include_request_headers: bool,
    pub exclude_paths: Vec<String>,
    pub exclude_methods: Vec<String>,
    pub redact_headers: Vec<String>,
    pub redact_fields: Vec<String>,
    pub redact_replacement: String,
    pub trust_proxy_headers: bool,
    pub backend_timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: AuditBackendConfig::Log,
            log_level: Level::INFO,
            log_request_body: false,
            max_body_log_size: 10 * 1024,
            include_query_params: true,
            include_request_headers: false,
            exclude_paths: strings(&["/health", "/metrics", "/docs", "/openapi.json"]),
            exclude_methods: strings(&["OPTIONS"]),
            redact_headers: strings(&[
                "Authorization",
                "Cookie",
                "Set-Cookie",
                "X-API-Key",
                "X-Auth-Token",
                "X-Session-ID",
            ]),
            redact_fields: strings(&[
                "password",
                "passwd",
                "secret",
                "token",
                "api_key",
                "apikey",
                "credit_card",
                "card_number",
                "cvv",
                "ssn",
                "social_security",
                "access_token",
                "refresh_token",
            ]),
            redact_replacement: REDACTED.to_string(),
            trust_proxy_headers: false,
            backend_timeout: Duration::from_secs(2),
        }
    }
}

impl AuditConfig {
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: AuditBackendConfig::File { path: path.into() },
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn with_request_body(mut self) -> Self {
        self.log_request_body = true;
        self
    }

    #[must_use]
    pub const fn with_request_headers(mut self) -> Self {
        self.include_request_headers = true;
        self
    }

    #[must_use]
    pub const fn trusting_proxy_headers(mut self) -> Self {
        self.trust_proxy_headers = true;
        self
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}
