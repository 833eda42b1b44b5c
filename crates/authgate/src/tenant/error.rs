//! Tenant resolution failures

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("tenant '{tenant_id}' not found")]
    NotFound { tenant_id: String },

    #[error("tenant '{tenant_id}' is inactive")]
    Inactive { tenant_id: String },

    #[error("tenant access denied: {reason}")]
    AccessDenied {
        tenant_id: Option<String>,
        reason: String,
    },
}

impl TenantError {
    pub(crate) fn access_denied(tenant_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            tenant_id: tenant_id.map(String::from),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Inactive { .. } | Self::AccessDenied { .. } => StatusCode::FORBIDDEN,
        }
    }

    /// Value of the `error_code` response field
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "TENANT_NOT_FOUND",
            Self::Inactive { .. } => "TENANT_INACTIVE",
            Self::AccessDenied { .. } => "TENANT_ACCESS_DENIED",
        }
    }

    #[must_use]
    pub fn public_detail(&self) -> String {
        match self {
            Self::NotFound { tenant_id } => format!("Tenant not found: {tenant_id}"),
            Self::Inactive { tenant_id } => format!("Tenant is inactive: {tenant_id}"),
            Self::AccessDenied { reason, .. } => reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_codes() {
        let err = TenantError::NotFound {
            tenant_id: "acme".into(),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_detail(), "Tenant not found: acme");

        let err = TenantError::access_denied(Some("acme"), "Admin tenant override is disabled");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "TENANT_ACCESS_DENIED");
        assert_eq!(err.public_detail(), "Admin tenant override is disabled");
    }
}
