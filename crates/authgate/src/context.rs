//! Request snapshot and the per-request context populated by the pipeline

use std::net::IpAddr;
use std::sync::Arc;

use http::header::{COOKIE, CONTENT_LENGTH, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{Identity, TokenError};
use crate::constants::{FORWARDED_FOR_HEADER, REAL_IP_HEADER};
use crate::error::RequestError;
use crate::rate_limit::RateLimitDecision;
use crate::rbac::{EffectivePermissionSet, PermissionError};
use crate::tenant::TenantInfo;

/// Read-only view of an inbound request.
///
/// Stages never see the body stream; the body is only present when a host
/// buffered it for audit logging.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub peer_addr: Option<IpAddr>,
    pub body_size: u64,
    pub body: Option<Value>,
}

impl RequestSnapshot {
    /// Snapshot from a method and a path with optional query string
    #[must_use]
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (path_and_query, None),
        };

        Self {
            method,
            path: if path.is_empty() { "/".into() } else { path.into() },
            query,
            headers: HeaderMap::new(),
            peer_addr: None,
            body_size: 0,
            body: None,
        }
    }

    /// Snapshot from `http` request parts. The body size comes from `Content-Length`.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        let body_size = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(String::from),
            headers: parts.headers.clone(),
            peer_addr: None,
            body_size,
            body: None,
        }
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    #[must_use]
    pub const fn with_peer_addr(mut self, addr: IpAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    #[must_use]
    pub const fn with_body_size(mut self, size: u64) -> Self {
        self.body_size = size;
        self
    }

    /// Attach a parsed body. `body_size` keeps the size of the bytes received.
    #[must_use]
    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// First value of a header, if it is valid visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Cookie value from any `Cookie` header
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim())
    }

    /// Decoded query parameters in order of appearance
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First decoded value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(USER_AGENT.as_str())
    }

    /// Client address. Proxy headers are consulted only when `trust_proxy` is set.
    pub fn client_ip(&self, trust_proxy: bool) -> Option<String> {
        if trust_proxy {
            let forwarded = self
                .header(FORWARDED_FOR_HEADER)
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return Some(ip.to_string());
            }

            if let Some(ip) = self.header(REAL_IP_HEADER).map(str::trim).filter(|v| !v.is_empty()) {
                return Some(ip.to_string());
            }
        }

        self.peer_addr.map(|addr| addr.to_string())
    }
}

/// Request-scoped results of each pipeline stage.
///
/// Stages write only their own slot. Handlers read the context through the
/// accessors or, under axum, the [`FromRequestParts`](axum::extract::FromRequestParts)
/// extractor.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    identity: Option<Arc<Identity>>,
    tenant: Option<Arc<TenantInfo>>,
    permissions: Option<Arc<EffectivePermissionSet>>,
    rate_limit: Option<RateLimitDecision>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            identity: None,
            tenant: None,
            permissions: None,
            rate_limit: None,
        }
    }

    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_deref()
    }

    pub fn tenant(&self) -> Option<&TenantInfo> {
        self.tenant.as_deref()
    }

    pub const fn tenant_arc(&self) -> Option<&Arc<TenantInfo>> {
        self.tenant.as_ref()
    }

    pub fn permissions(&self) -> Option<&EffectivePermissionSet> {
        self.permissions.as_deref()
    }

    pub const fn rate_limit(&self) -> Option<&RateLimitDecision> {
        self.rate_limit.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity().map(|i| i.subject_id.as_str())
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant().map(|t| t.tenant_id.as_str())
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(Arc::new(identity));
    }

    pub(crate) fn set_tenant(&mut self, tenant: TenantInfo) {
        self.tenant = Some(Arc::new(tenant));
    }

    pub(crate) fn set_permissions(&mut self, permissions: EffectivePermissionSet) {
        self.permissions = Some(Arc::new(permissions));
    }

    pub(crate) fn set_rate_limit(&mut self, decision: RateLimitDecision) {
        self.rate_limit = Some(decision);
    }

    /// Permissions to check against: the resolved set, or the identity's
    /// direct grants when no resolver ran.
    fn effective(&self) -> Result<EffectivePermissionSet, RequestError> {
        let identity = self.identity().ok_or(TokenError::MissingCredential)?;
        Ok(self
            .permissions()
            .cloned()
            .unwrap_or_else(|| identity.direct_permissions.iter().cloned().collect()))
    }

    /// Fail with 403 unless the caller holds `required`
    pub fn require_permission(&self, required: &str) -> Result<(), RequestError> {
        if self.effective()?.allows(required) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.user_id().unwrap_or_default(),
                required,
                "Permission denied"
            );
            Err(PermissionError::InsufficientPermission {
                required: required.to_string(),
            }
            .into())
        }
    }

    /// Fail with 403 unless the caller holds at least one of `required`
    pub fn require_any_permission<S: AsRef<str>>(
        &self,
        required: &[S],
    ) -> Result<(), RequestError> {
        let effective = self.effective()?;
        if required.iter().any(|p| effective.allows(p.as_ref())) {
            return Ok(());
        }
        Err(PermissionError::InsufficientPermission {
            required: required
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(" | "),
        }
        .into())
    }

    pub fn require_role<S: AsRef<str>>(&self, roles: &[S]) -> Result<(), RequestError> {
        let identity = self.identity().ok_or(TokenError::MissingCredential)?;
        if identity.has_any_role(roles) {
            return Ok(());
        }
        Err(PermissionError::InsufficientRole {
            required: roles.iter().map(|r| r.as_ref().to_string()).collect(),
        }
        .into())
    }
}

#[cfg(feature = "http")]
impl<S> axum::extract::FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (http::StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "auth pipeline middleware not installed",
        ))
    }
}
