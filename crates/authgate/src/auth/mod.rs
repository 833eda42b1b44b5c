//! Bearer token verification
//!
//! A [`TokenVerifier`] accepts exactly one signing algorithm. The declared
//! `alg` header is compared against it before any key is selected, so
//! `none` and cross-class tokens never reach signature verification.

mod claims;
mod config;
mod error;
mod extract;
mod issue;
mod jwks;
mod jwt;

pub use claims::{Identity, IdentityProvider};
pub use config::{JwtConfig, SigningAlgorithm, default_exempt_paths};
pub use error::TokenError;
pub use extract::extract_credential;
pub use issue::TokenSigner;
pub use jwks::{Jwk, JwkSet, JwksCache, JwksRefreshTask};
pub use jwt::TokenVerifier;
