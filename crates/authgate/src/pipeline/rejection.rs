//! Rendering per-request failures into responses

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::{Value, json};

use crate::constants::WWW_AUTHENTICATE_VALUE;
use crate::error::RequestError;
use crate::rate_limit::RateLimitError;

/// Status, headers and JSON body of a refused request
#[derive(Debug, Clone)]
pub struct Rejection {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
    code: &'static str,
}

impl Rejection {
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Stable error code, also written to the audit record
    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn into_http_response<B: From<Vec<u8>>>(self) -> http::Response<B> {
        let bytes = self.body.to_string().into_bytes();
        let length = bytes.len();

        let mut response = http::Response::new(B::from(bytes));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        headers.extend(self.headers);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        response
    }
}

impl From<&RequestError> for Rejection {
    fn from(err: &RequestError) -> Self {
        let detail = err.public_detail();
        let code = err.code();
        let mut headers = HeaderMap::new();

        let body = match err {
            RequestError::Token(_) => {
                headers.insert(
                    WWW_AUTHENTICATE,
                    HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
                );
                json!({ "detail": detail, "error": code })
            }
            RequestError::Tenant(_) => json!({ "detail": detail, "error_code": code }),
            RequestError::RateLimit(RateLimitError::Exceeded {
                retry_after,
                decision,
            }) => {
                decision.apply_headers(&mut headers);
                json!({ "detail": detail, "error": code, "retry_after": retry_after })
            }
            RequestError::RateLimit(_) | RequestError::Permission(_) => {
                json!({ "detail": detail, "error": code })
            }
        };

        Self {
            status: err.status(),
            headers,
            body,
            code,
        }
    }
}

impl From<RequestError> for Rejection {
    fn from(err: RequestError) -> Self {
        Self::from(&err)
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for Rejection {
    fn into_response(self) -> axum::response::Response {
        self.into_http_response()
    }
}

/// Response types the pipeline can produce and decorate
pub trait PipelineReply: Sized {
    fn from_rejection(rejection: Rejection) -> Self;

    fn status(&self) -> StatusCode;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Response body size in bytes, when known
    fn body_size(&self) -> u64 {
        0
    }
}

impl<B: From<Vec<u8>>> PipelineReply for http::Response<B> {
    fn from_rejection(rejection: Rejection) -> Self {
        rejection.into_http_response()
    }

    fn status(&self) -> StatusCode {
        Self::status(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Self::headers_mut(self)
    }

    fn body_size(&self) -> u64 {
        self.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenError;
    use crate::rate_limit::RateLimitDecision;
    use crate::rbac::PermissionError;
    use crate::tenant::TenantError;

    #[test]
    fn test_auth_rejection() {
        let rejection = Rejection::from(RequestError::from(TokenError::ExpiredCredential));
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.body()["error"], "token_expired");
        assert_eq!(rejection.body()["detail"], "Token has expired");
        assert_eq!(
            rejection.headers()[WWW_AUTHENTICATE],
            r#"Bearer realm="api""#
        );
    }

    #[test]
    fn test_tenant_rejection_uses_error_code() {
        let rejection = Rejection::from(RequestError::from(TenantError::Inactive {
            tenant_id: "acme".into(),
        }));
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
        assert_eq!(rejection.body()["error_code"], "TENANT_INACTIVE");
        assert!(rejection.body().get("error").is_none());
    }

    #[test]
    fn test_rate_limit_rejection_headers() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 10,
            remaining: 0,
            reset_at: 1_700_000_060,
            retry_after: Some(6),
            identifier: "ip:192.0.2.1".into(),
        };
        let rejection = Rejection::from(RequestError::from(RateLimitError::Exceeded {
            retry_after: 6,
            decision,
        }));

        assert_eq!(rejection.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejection.body()["retry_after"], 6);
        assert_eq!(rejection.body()["error"], "rate_limited");
        assert_eq!(rejection.headers()["retry-after"], "6");
        assert_eq!(rejection.headers()["x-ratelimit-remaining"], "0");
    }

    #[test]
    fn test_http_response_rendering() {
        let rejection = Rejection::from(RequestError::from(
            PermissionError::InsufficientPermission {
                required: "write:articles".into(),
            },
        ));
        let response: http::Response<Vec<u8>> = rejection.into_http_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(PipelineReply::body_size(&response), response.body().len() as u64);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, json!({ "detail": "Insufficient permissions", "error": "forbidden" }));
    }
}
