//! Token verification configuration types

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::MIN_HMAC_SECRET_LEN;
use crate::{Error, Result};

/// Signature algorithm accepted by a verifier instance.
///
/// Exactly one algorithm is configured per verifier; tokens declaring any
/// other algorithm are rejected before key selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum SigningAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    ES256,
    ES384,
    EdDSA,
}

impl SigningAlgorithm {
    /// JOSE `alg` header value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::EdDSA => "EdDSA",
        }
    }

    /// Shared-secret (HMAC) algorithms
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }

    #[must_use]
    pub const fn to_jsonwebtoken(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::HS256 => jsonwebtoken::Algorithm::HS256,
            Self::HS384 => jsonwebtoken::Algorithm::HS384,
            Self::HS512 => jsonwebtoken::Algorithm::HS512,
            Self::RS256 => jsonwebtoken::Algorithm::RS256,
            Self::RS384 => jsonwebtoken::Algorithm::RS384,
            Self::RS512 => jsonwebtoken::Algorithm::RS512,
            Self::PS256 => jsonwebtoken::Algorithm::PS256,
            Self::PS384 => jsonwebtoken::Algorithm::PS384,
            Self::PS512 => jsonwebtoken::Algorithm::PS512,
            Self::ES256 => jsonwebtoken::Algorithm::ES256,
            Self::ES384 => jsonwebtoken::Algorithm::ES384,
            Self::EdDSA => jsonwebtoken::Algorithm::EdDSA,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "PS256" => Ok(Self::PS256),
            "PS384" => Ok(Self::PS384),
            "PS512" => Ok(Self::PS512),
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            "EDDSA" => Ok(Self::EdDSA),
            other => Err(Error::Config(format!("Unsupported signing algorithm: {other}"))),
        }
    }
}

/// Paths that never require a credential
pub fn default_exempt_paths() -> Vec<String> {
    [
        "/health",
        "/metrics",
        "/docs",
        "/openapi.json",
        "/redoc",
        "/auth/login",
        "/auth/refresh",
        "/auth/sso/*",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Token verifier configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// The single accepted signature algorithm
    pub algorithm: SigningAlgorithm,
    /// HMAC secret for HS* algorithms
    pub secret: Option<String>,
    /// PEM public key for asymmetric algorithms
    pub public_key_pem: Option<String>,
    /// PEM private key, only needed for local token issuance
    pub private_key_pem: Option<String>,
    /// Remote key set for asymmetric algorithms
    pub jwks_uri: Option<Url>,
    /// Expected `iss` claim
    pub issuer: Option<String>,
    /// Accepted `aud` values (token must carry at least one)
    pub audience: Vec<String>,
    /// Clock skew tolerance for `exp`/`nbf`
    pub leeway: Duration,
    /// Reject tokens without an `exp` claim
    pub require_exp: bool,
    /// Header carrying `Bearer <token>`
    pub token_header: String,
    /// Cookie checked when the header is absent
    pub token_cookie: Option<String>,
    /// Query parameter checked when header and cookie are absent
    pub token_query_param: Option<String>,
    /// Claim holding the tenant hint
    pub tenant_claim: String,
    /// Exact paths or `prefix/*` patterns that skip verification
    pub exempt_paths: Vec<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub jwks_cache_ttl: Duration,
    pub jwks_refresh_interval: Duration,
    pub jwks_fetch_timeout: Duration,
    /// Minimum spacing between refetches triggered by unknown `kid`s
    pub jwks_refetch_cooldown: Duration,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("algorithm", &self.algorithm)
            .field("has_secret", &self.secret.is_some())
            .field("has_public_key", &self.public_key_pem.is_some())
            .field("jwks_uri", &self.jwks_uri)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .field("token_header", &self.token_header)
            .field("token_cookie", &self.token_cookie)
            .field("token_query_param", &self.token_query_param)
            .field("tenant_claim", &self.tenant_claim)
            .field("exempt_paths", &self.exempt_paths)
            .finish_non_exhaustive()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::HS256,
            secret: None,
            public_key_pem: None,
            private_key_pem: None,
            jwks_uri: None,
            issuer: None,
            audience: vec![],
            leeway: Duration::ZERO,
            require_exp: true,
            token_header: "Authorization".to_string(),
            token_cookie: None,
            token_query_param: None,
            tenant_claim: "tenant_id".to_string(),
            exempt_paths: default_exempt_paths(),
            access_token_ttl: Duration::from_secs(30 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            jwks_cache_ttl: Duration::from_secs(3600),
            jwks_refresh_interval: Duration::from_secs(300),
            jwks_fetch_timeout: Duration::from_secs(10),
            jwks_refetch_cooldown: Duration::from_secs(10),
        }
    }
}

impl JwtConfig {
    /// HS256 verifier with a shared secret
    #[must_use]
    pub fn hmac(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Asymmetric verifier with a static PEM public key
    #[must_use]
    pub fn public_key(algorithm: SigningAlgorithm, pem: impl Into<String>) -> Self {
        Self {
            algorithm,
            public_key_pem: Some(pem.into()),
            ..Default::default()
        }
    }

    /// Asymmetric verifier backed by a remote key set
    #[must_use]
    pub fn jwks(algorithm: SigningAlgorithm, uri: Url) -> Self {
        Self {
            algorithm,
            jwks_uri: Some(uri),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    #[must_use]
    pub fn with_private_key(mut self, pem: impl Into<String>) -> Self {
        self.private_key_pem = Some(pem.into());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>) -> Self {
        self.token_cookie = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, name: impl Into<String>) -> Self {
        self.token_query_param = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_tenant_claim(mut self, claim: impl Into<String>) -> Self {
        self.tenant_claim = claim.into();
        self
    }

    #[must_use]
    pub fn with_exempt_paths(mut self, paths: Vec<String>) -> Self {
        self.exempt_paths = paths;
        self
    }

    /// Check that the key material matches the configured algorithm class
    pub fn validate(&self) -> Result<()> {
        if self.algorithm.is_symmetric() {
            let secret = self.secret.as_deref().ok_or_else(|| {
                Error::Config(format!("{} requires a shared secret", self.algorithm))
            })?;
            if secret.len() < MIN_HMAC_SECRET_LEN {
                return Err(Error::Config(format!(
                    "JWT secret must be at least {MIN_HMAC_SECRET_LEN} characters"
                )));
            }
            if self.public_key_pem.is_some() || self.jwks_uri.is_some() {
                return Err(Error::Config(format!(
                    "{} uses a shared secret; public keys are not accepted",
                    self.algorithm
                )));
            }
        } else {
            match (&self.public_key_pem, &self.jwks_uri) {
                (None, None) => {
                    return Err(Error::Config(format!(
                        "{} requires a public key or a JWKS URI",
                        self.algorithm
                    )));
                }
                (Some(_), Some(_)) => {
                    return Err(Error::Config(
                        "Configure either a public key or a JWKS URI, not both".into(),
                    ));
                }
                _ => {}
            }
            if self.secret.is_some() {
                return Err(Error::Config(format!(
                    "{} uses asymmetric keys; a shared secret is not accepted",
                    self.algorithm
                )));
            }
        }

        if self.token_header.trim().is_empty() {
            return Err(Error::Config("token_header must not be empty".into()));
        }

        Ok(())
    }
}
