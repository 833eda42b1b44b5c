//! Composable authentication and authorization pipeline
//!
//! Requests pass through a fixed chain of stages:
//! audit (outermost) → rate limiting → token verification → tenant resolution →
//! permission resolution → handler. Each stage is optional, but RBAC and tenant
//! resolution require token verification to be configured.

pub mod audit;
pub mod auth;
pub mod config;
mod constants;
pub mod context;
mod error;
#[cfg(feature = "http")]
pub mod middleware;
pub mod observability;
pub mod pattern;
pub mod pipeline;
pub mod rate_limit;
pub mod rbac;
pub mod tenant;

pub use audit::{AuditBackend, AuditConfig, AuditRecord, AuditRecorder};
pub use auth::{Identity, IdentityProvider, JwtConfig, SigningAlgorithm, TokenSigner, TokenVerifier};
pub use config::{AppConfig, ConfigBuilder, LoggingConfig, ServerConfig};
pub use context::{RequestContext, RequestSnapshot};
pub use error::{Error, RequestError, Result};
pub use pipeline::{AuthPipeline, AuthPipelineBuilder, PipelineConfig, PipelineReply, Rejection};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use rbac::{EffectivePermissionSet, PermissionResolver, RbacConfig, RoleDefinition};
pub use tenant::{TenantConfig, TenantInfo, TenantResolver};
