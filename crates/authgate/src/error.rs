use http::StatusCode;
use thiserror::Error;

use crate::auth::TokenError;
use crate::rate_limit::RateLimitError;
use crate::rbac::PermissionError;
use crate::tenant::TenantError;

/// Configuration and startup errors. Any of these prevents the pipeline from starting.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Role inheritance cycle detected: {}", .path.join(" -> "))]
    InheritanceCycle { role: String, path: Vec<String> },

    #[error("Role '{referenced_by}' inherits from undefined role '{role}'")]
    UndefinedRole { role: String, referenced_by: String },

    #[error("Role '{role}' is inherited by '{inherited_by}' and cannot be removed")]
    RoleInUse { role: String, inherited_by: String },

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("{component} requires {requires} to be configured")]
    MissingDependency {
        component: &'static str,
        requires: &'static str,
    },

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::MissingDependency { .. })
    }

    #[must_use]
    pub const fn is_role_graph(&self) -> bool {
        matches!(
            self,
            Self::InheritanceCycle { .. }
                | Self::UndefinedRole { .. }
                | Self::RoleInUse { .. }
                | Self::UnknownRole(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Per-request failure raised by any pipeline stage.
///
/// The `Display` output is for logs only. Response bodies are built from
/// [`RequestError::code`] and [`RequestError::public_detail`].
#[derive(Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

impl RequestError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::Tenant(err) => err.status(),
            Self::RateLimit(err) => err.status(),
        }
    }

    /// Stable machine-readable discriminant
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Token(err) => err.code(),
            Self::Permission(_) => "forbidden",
            Self::Tenant(err) => err.code(),
            Self::RateLimit(err) => err.code(),
        }
    }

    /// Human-readable message safe to return to callers
    #[must_use]
    pub fn public_detail(&self) -> String {
        match self {
            Self::Token(err) => err.public_detail().to_string(),
            Self::Permission(err) => err.public_detail().to_string(),
            Self::Tenant(err) => err.public_detail(),
            Self::RateLimit(err) => err.public_detail(),
        }
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Token(_))
    }
}
