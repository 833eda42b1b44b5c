//! Stage composition and request execution
//!
//! [`AuthPipeline::run`] drives a request through the configured stages:
//!
//! 1. audit (wraps everything below and records the outcome)
//! 2. rate limiting
//! 3. token verification
//! 4. tenant resolution
//! 5. permission resolution and route requirements
//! 6. the handler, inside the tenant's task-local scope
//!
//! The first failing stage short-circuits with a [`Rejection`].

mod builder;
mod config;
mod rejection;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use http::HeaderValue;

pub use builder::AuthPipelineBuilder;
pub use config::PipelineConfig;
pub use rejection::{PipelineReply, Rejection};

use crate::audit::{AuditRecorder, ResponseSummary};
use crate::auth::{TokenError, TokenVerifier};
use crate::constants::TENANT_HEADER;
use crate::context::{RequestContext, RequestSnapshot};
use crate::error::RequestError;
use crate::rate_limit::RateLimiter;
use crate::rbac::PermissionResolver;
use crate::tenant::{TenantResolver, with_tenant};

/// An immutable, cheaply cloneable chain of auth stages
#[derive(Debug, Clone)]
pub struct AuthPipeline {
    verifier: Option<Arc<TokenVerifier>>,
    permissions: Option<Arc<PermissionResolver>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    tenants: Option<Arc<TenantResolver>>,
    audit: Option<Arc<AuditRecorder>>,
}

impl AuthPipeline {
    pub fn builder() -> AuthPipelineBuilder {
        AuthPipelineBuilder::new()
    }

    /// Build every stage named in `config`
    pub async fn from_config(config: PipelineConfig) -> crate::Result<Self> {
        AuthPipelineBuilder::from_config(config).await?.build()
    }

    pub fn enabled_components(&self) -> Vec<&'static str> {
        config::component_names(
            self.verifier.is_some(),
            self.permissions.is_some(),
            self.rate_limiter.is_some(),
            self.tenants.is_some(),
            self.audit.is_some(),
        )
    }

    /// e.g. `auth pipeline (jwt, rbac, audit)`
    pub fn describe(&self) -> String {
        let components = self.enabled_components();
        if components.is_empty() {
            "auth pipeline (none)".to_string()
        } else {
            format!("auth pipeline ({})", components.join(", "))
        }
    }

    pub fn verifier(&self) -> Option<&Arc<TokenVerifier>> {
        self.verifier.as_ref()
    }

    pub fn permission_resolver(&self) -> Option<&Arc<PermissionResolver>> {
        self.permissions.as_ref()
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    pub fn tenant_resolver(&self) -> Option<&Arc<TenantResolver>> {
        self.tenants.as_ref()
    }

    pub fn audit_recorder(&self) -> Option<&Arc<AuditRecorder>> {
        self.audit.as_ref()
    }

    /// Run the admission stages, filling `context` in stage order
    pub async fn authorize(
        &self,
        request: &RequestSnapshot,
        context: &mut RequestContext,
    ) -> Result<(), RequestError> {
        if let Some(limiter) = &self.rate_limiter
            && let Some(decision) = limiter.check(request, context.identity()).await?
        {
            context.set_rate_limit(decision);
        }

        if let Some(verifier) = &self.verifier
            && let Some(identity) = verifier.authenticate(request).await?
        {
            context.set_identity(identity);
        }

        if let Some(tenants) = &self.tenants
            && !tenants.is_excluded(&request.path)
            && let Some(tenant) = tenants.resolve(request, context.identity()).await?
        {
            context.set_tenant(tenant);
        }

        if let Some(resolver) = &self.permissions {
            if let Some(identity) = context.identity() {
                let effective = resolver.resolve(identity);
                context.set_permissions(effective);
            }

            if let Some(required) = resolver
                .route_requirement(&request.path)
                .filter(|required| !required.is_empty())
            {
                let effective = context
                    .permissions()
                    .ok_or(TokenError::MissingCredential)?;
                resolver.require_any(effective, required)?;
            }
        }

        Ok(())
    }

    /// Authorize `request`, then call `handler` with the populated context.
    ///
    /// Rejections are rendered through [`PipelineReply::from_rejection`]. Every
    /// outcome is audited once the response is known.
    pub async fn run<F, Fut, R>(&self, request: &RequestSnapshot, handler: F) -> R
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = R>,
        R: PipelineReply,
    {
        let started = Instant::now();
        let mut context = RequestContext::new();

        let (mut reply, error_code) = match self.authorize(request, &mut context).await {
            Ok(()) => {
                let tenant = context.tenant_arc().cloned();
                (with_tenant(tenant, handler(context.clone())).await, None)
            }
            Err(err) => {
                tracing::warn!(
                    request_id = %context.request_id(),
                    method = %request.method,
                    path = %request.path,
                    code = err.code(),
                    reason = %err,
                    "Request rejected"
                );
                #[cfg(feature = "metrics")]
                if err.is_auth() {
                    crate::observability::record_auth_failure(err.code());
                }
                let code = err.code();
                (R::from_rejection(Rejection::from(err)), Some(code))
            }
        };

        self.decorate(&mut reply, &context);

        let elapsed = started.elapsed();
        #[cfg(feature = "metrics")]
        crate::observability::record_request(
            if error_code.is_some() { "rejected" } else { "allowed" },
            elapsed,
        );

        if let Some(audit) = &self.audit {
            let mut summary =
                ResponseSummary::new(reply.status(), elapsed).with_body_size(reply.body_size());
            if let Some(code) = error_code {
                summary = summary.rejected(code);
            }
            audit.record(request, &summary, &context).await;
        }

        reply
    }

    fn decorate<R: PipelineReply>(&self, reply: &mut R, context: &RequestContext) {
        let headers = reply.headers_mut();

        if let Some(tenant_id) = context.tenant_id()
            && let Ok(value) = HeaderValue::from_str(tenant_id)
        {
            headers.insert(TENANT_HEADER, value);
        }

        if let Some(decision) = context.rate_limit()
            && self
                .rate_limiter
                .as_ref()
                .is_some_and(|limiter| limiter.include_headers())
        {
            decision.apply_headers(headers);
        }
    }
}
