//! Prometheus metrics for the auth pipeline

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::{Error, Result};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const METRIC_INFO: &str = "authgate_info";
const METRIC_REQUESTS: &str = "authgate_requests_total";
const METRIC_REQUEST_DURATION: &str = "authgate_request_duration_seconds";
const METRIC_AUTH_FAILURES: &str = "authgate_auth_failures_total";
const METRIC_RATE_LIMITED: &str = "authgate_rate_limited_total";
const METRIC_RATE_LIMIT_BACKEND_ERRORS: &str = "authgate_rate_limit_backend_errors_total";
const METRIC_AUDIT_BACKEND_ERRORS: &str = "authgate_audit_backend_errors_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_counter!(METRIC_REQUESTS, "Requests processed by the auth pipeline");
    describe_histogram!(
        METRIC_REQUEST_DURATION,
        "End-to-end request duration through the pipeline"
    );
    describe_counter!(METRIC_AUTH_FAILURES, "Rejected credentials by error code");
    describe_counter!(METRIC_RATE_LIMITED, "Requests refused by the rate limiter");
    describe_counter!(
        METRIC_RATE_LIMIT_BACKEND_ERRORS,
        "Rate limit store failures and timeouts"
    );
    describe_counter!(METRIC_AUDIT_BACKEND_ERRORS, "Dropped audit records");

    gauge!(METRIC_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// `outcome` is `allowed` or `rejected`
pub fn record_request(outcome: &'static str, duration: Duration) {
    counter!(METRIC_REQUESTS, "outcome" => outcome).increment(1);
    histogram!(METRIC_REQUEST_DURATION, "outcome" => outcome).record(duration.as_secs_f64());
}

pub fn record_auth_failure(code: &'static str) {
    counter!(METRIC_AUTH_FAILURES, "error" => code).increment(1);
}

pub fn record_rate_limited() {
    counter!(METRIC_RATE_LIMITED).increment(1);
}

pub fn record_rate_limit_backend_error(backend: &'static str) {
    counter!(METRIC_RATE_LIMIT_BACKEND_ERRORS, "backend" => backend).increment(1);
}

pub fn record_audit_backend_error(backend: &'static str) {
    counter!(METRIC_AUDIT_BACKEND_ERRORS, "backend" => backend).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics_without_init() {
        assert!(render_metrics().is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("allowed", Duration::from_millis(3));
        record_auth_failure("token_expired");
        record_rate_limited();
    }
}
