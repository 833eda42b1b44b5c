//! Token verification error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing credential")]
    MissingCredential,

    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("invalid signature")]
    SignatureInvalid,

    #[error("algorithm mismatch: token declares '{declared}', verifier accepts '{expected}'")]
    AlgorithmMismatch {
        declared: String,
        expected: &'static str,
    },

    #[error("credential expired")]
    ExpiredCredential,

    #[error("credential not yet valid")]
    NotYetValid,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("refresh tokens cannot authenticate requests")]
    RefreshTokenRejected,

    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    #[error("signing keys unavailable: {0}")]
    KeyUnavailable(String),
}

impl TokenError {
    /// Wire discriminant: `missing_token`, `token_expired` or `invalid_token`
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_token",
            Self::ExpiredCredential => "token_expired",
            _ => "invalid_token",
        }
    }

    #[must_use]
    pub const fn public_detail(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Not authenticated",
            Self::ExpiredCredential => "Token has expired",
            _ => "Invalid token",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::ExpiredCredential,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::MalformedCredential(format!("missing required claim '{claim}'"))
            }
            _ => Self::MalformedCredential(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;
