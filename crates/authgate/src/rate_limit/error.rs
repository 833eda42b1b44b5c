//! Rate limiting failures

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use super::decision::RateLimitDecision;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded for '{}', retry after {retry_after}s", .decision.identifier)]
    Exceeded {
        retry_after: u64,
        decision: RateLimitDecision,
    },

    #[error("rate limit backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("rate limit backend timed out after {0:?}")]
    Timeout(Duration),
}

impl RateLimitError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Exceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BackendUnavailable(_) | Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Exceeded { .. } => "rate_limited",
            Self::BackendUnavailable(_) | Self::Timeout(_) => "service_unavailable",
        }
    }

    #[must_use]
    pub fn public_detail(&self) -> String {
        match self {
            Self::Exceeded { retry_after, .. } => {
                format!("Rate limit exceeded. Retry after {retry_after} seconds.")
            }
            Self::BackendUnavailable(_) | Self::Timeout(_) => {
                "Rate limiting temporarily unavailable".to_string()
            }
        }
    }

    pub const fn is_backend_failure(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Timeout(_))
    }
}
