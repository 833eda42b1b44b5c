//! Request audit recorder

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::backend::{AuditBackend, FileAuditBackend, LogAuditBackend, MemoryAuditBackend};
use super::config::{AuditBackendConfig, AuditConfig};
use super::record::{AuditRecord, ResponseSummary};
use super::redact::Redactor;
use crate::context::{RequestContext, RequestSnapshot};
use crate::pattern::matches_any;
use crate::{Error, Result};

const UNKNOWN_IP: &str = "unknown";

/// Writes one record per request to the configured backend.
///
/// Recording is best effort: backend errors and timeouts are logged and
/// dropped, so [`record`](Self::record) never fails the request.
pub struct AuditRecorder {
    config: AuditConfig,
    backend: Arc<dyn AuditBackend>,
    redactor: Redactor,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("backend", &self.backend.name())
            .field("enabled", &self.config.enabled)
            .finish_non_exhaustive()
    }
}

impl AuditRecorder {
    /// Build the backend named by `config.backend`
    pub async fn from_config(config: AuditConfig) -> Result<Self> {
        let backend: Arc<dyn AuditBackend> = match &config.backend {
            AuditBackendConfig::Log => Arc::new(LogAuditBackend::new(config.log_level)),
            AuditBackendConfig::File { path } => Arc::new(
                FileAuditBackend::open(path)
                    .await
                    .map_err(|e| Error::Config(format!("audit file {}: {e}", path.display())))?,
            ),
            AuditBackendConfig::Memory { capacity } => Arc::new(MemoryAuditBackend::new(*capacity)),
        };
        Ok(Self::with_backend(config, backend))
    }

    /// Use a caller-supplied backend, ignoring `config.backend`
    pub fn with_backend(config: AuditConfig, backend: Arc<dyn AuditBackend>) -> Self {
        let redactor = Redactor::new(&config);
        Self {
            config,
            backend,
            redactor,
        }
    }

    pub const fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub const fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn is_excluded(&self, request: &RequestSnapshot) -> bool {
        !self.config.enabled
            || matches_any(&self.config.exclude_paths, &request.path)
            || self
                .config
                .exclude_methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(request.method.as_str()))
    }

    pub fn build_record(
        &self,
        request: &RequestSnapshot,
        response: &ResponseSummary,
        context: &RequestContext,
    ) -> AuditRecord {
        let mut metadata = Map::new();

        if self.config.include_query_params {
            let pairs = request.query_pairs();
            if !pairs.is_empty() {
                metadata.insert("query_params".into(), Value::Object(self.redactor.query(pairs)));
            }
        }
        if self.config.include_request_headers {
            metadata.insert(
                "request_headers".into(),
                Value::Object(self.redactor.headers(&request.headers)),
            );
        }
        if self.config.log_request_body
            && let Some(body) = &request.body
        {
            metadata.insert(
                "request_body".into(),
                self.redactor.body(body.clone(), self.config.max_body_log_size),
            );
        }
        metadata.insert("request_id".into(), Value::String(context.request_id().to_string()));

        AuditRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            method: request.method.to_string(),
            path: request.path.clone(),
            status_code: response.status.as_u16(),
            duration_ms: response.duration.as_secs_f64() * 1000.0,
            ip_address: request
                .client_ip(self.config.trust_proxy_headers)
                .unwrap_or_else(|| UNKNOWN_IP.to_string()),
            user_agent: request.user_agent().unwrap_or_default().to_string(),
            user_id: context.user_id().map(String::from),
            tenant_id: context.tenant_id().map(String::from),
            request_body_size: request.body_size,
            response_body_size: response.body_size,
            error: response.error(),
            metadata,
        }
    }

    /// Record a finished request. Never fails.
    pub async fn record(
        &self,
        request: &RequestSnapshot,
        response: &ResponseSummary,
        context: &RequestContext,
    ) {
        if self.is_excluded(request) {
            return;
        }

        let record = self.build_record(request, response, context);
        let outcome = tokio::time::timeout(self.config.backend_timeout, self.backend.store(&record)).await;

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.config.backend_timeout),
        };

        tracing::warn!(
            backend = self.backend.name(),
            record_id = %record.id,
            error = %failure,
            "Audit record dropped"
        );
        #[cfg(feature = "metrics")]
        crate::observability::record_audit_backend_error(self.backend.name());
    }
}
