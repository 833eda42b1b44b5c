//! axum integration for [`AuthPipeline`]
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(pipeline.clone(), auth_pipeline_middleware));
//! ```
//!
//! Serve with `into_make_service_with_connect_info::<SocketAddr>()` so the peer
//! address is available for rate limiting and audit records.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::CONTENT_TYPE;
use http::request::Parts;

use crate::context::RequestSnapshot;
use crate::pipeline::AuthPipeline;

/// Largest request body buffered for audit logging
pub const MAX_BUFFERED_BODY: u64 = 1024 * 1024;

/// Run every request through the pipeline.
///
/// The handler sees the populated [`RequestContext`](crate::RequestContext) in the
/// request extensions and can extract it directly.
#[allow(clippy::future_not_send)]
pub async fn auth_pipeline_middleware(
    State(pipeline): State<AuthPipeline>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut snapshot = RequestSnapshot::from_parts(&parts);
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        snapshot = snapshot.with_peer_addr(addr.ip());
    }

    let body = if should_buffer(&pipeline, &parts) {
        match axum::body::to_bytes(body, MAX_BUFFERED_BODY as usize).await {
            Ok(bytes) => {
                snapshot = snapshot.with_body_size(bytes.len() as u64);
                if let Ok(json) = serde_json::from_slice(&bytes) {
                    snapshot = snapshot.with_json_body(json);
                }
                Body::from(bytes)
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %snapshot.path, "Failed to read request body");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    } else {
        body
    };

    pipeline
        .run(&snapshot, move |context| {
            parts.extensions.insert(context);
            next.run(Request::from_parts(parts, body))
        })
        .await
}

/// Buffer only JSON bodies of known, bounded size, and only when audit wants them
fn should_buffer(pipeline: &AuthPipeline, parts: &Parts) -> bool {
    let wants_body = pipeline
        .audit_recorder()
        .is_some_and(|audit| audit.config().enabled && audit.config().log_request_body);
    if !wants_body {
        return false;
    }

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let bounded = parts
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|len| len <= MAX_BUFFERED_BODY);

    is_json && bounded
}
