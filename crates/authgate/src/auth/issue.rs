//! Local token issuance

use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Map, Value};

use super::config::{JwtConfig, SigningAlgorithm};
use crate::{Error, Result};

/// Claims the signer always sets itself
const RESERVED_CLAIMS: &[&str] = &["exp", "iat", "iss", "aud", "token_type"];

/// Mints access and refresh tokens matching a verifier configuration
pub struct TokenSigner {
    algorithm: SigningAlgorithm,
    key: EncodingKey,
    key_id: Option<String>,
    issuer: Option<String>,
    audience: Vec<String>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Build a signer from the secret (HS*) or private key (asymmetric) in `config`
    pub fn new(config: &JwtConfig) -> Result<Self> {
        use SigningAlgorithm as A;

        let private_pem = || {
            config
                .private_key_pem
                .as_deref()
                .map(str::as_bytes)
                .ok_or_else(|| {
                    Error::Config(format!("{} signing requires a private key", config.algorithm))
                })
        };

        let key = match config.algorithm {
            A::HS256 | A::HS384 | A::HS512 => {
                let secret = config
                    .secret
                    .as_deref()
                    .ok_or_else(|| Error::Config("HMAC secret not configured".into()))?;
                Ok(EncodingKey::from_secret(secret.as_bytes()))
            }
            A::RS256 | A::RS384 | A::RS512 | A::PS256 | A::PS384 | A::PS512 => {
                EncodingKey::from_rsa_pem(private_pem()?)
            }
            A::ES256 | A::ES384 => EncodingKey::from_ec_pem(private_pem()?),
            A::EdDSA => EncodingKey::from_ed_pem(private_pem()?),
        }
        .map_err(|e| Error::InvalidKey(e.to_string()))?;

        Ok(Self {
            algorithm: config.algorithm,
            key,
            key_id: None,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        })
    }

    /// Stamp a `kid` into every header, for verifiers resolving keys by id
    #[must_use]
    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_id = Some(kid.into());
        self
    }

    /// Issue an access token. Reserved claims in `extra` are ignored.
    pub fn issue_access_token(&self, subject: &str, extra: Map<String, Value>) -> Result<String> {
        self.sign(subject, extra, self.access_ttl, "access")
    }

    pub fn issue_refresh_token(&self, subject: &str) -> Result<String> {
        self.sign(subject, Map::new(), self.refresh_ttl, "refresh")
    }

    /// Issue an access token with an explicit lifetime
    pub fn issue_with_ttl(
        &self,
        subject: &str,
        extra: Map<String, Value>,
        ttl: Duration,
    ) -> Result<String> {
        self.sign(subject, extra, ttl, "access")
    }

    fn sign(
        &self,
        subject: &str,
        extra: Map<String, Value>,
        ttl: Duration,
        token_type: &str,
    ) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        let mut claims: Map<String, Value> = extra
            .into_iter()
            .filter(|(name, _)| !RESERVED_CLAIMS.contains(&name.as_str()))
            .collect();

        claims.insert("sub".into(), Value::from(subject));
        claims.insert("iat".into(), Value::from(now));
        claims.insert("exp".into(), Value::from(now.saturating_add(ttl)));
        claims.insert("token_type".into(), Value::from(token_type));
        if let Some(issuer) = &self.issuer {
            claims.insert("iss".into(), Value::from(issuer.as_str()));
        }
        match self.audience.as_slice() {
            [] => {}
            [single] => {
                claims.insert("aud".into(), Value::from(single.as_str()));
            }
            many => {
                claims.insert("aud".into(), Value::from(many.to_vec()));
            }
        }

        let mut header = Header::new(self.algorithm.to_jsonwebtoken());
        header.kid.clone_from(&self.key_id);

        jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| Error::InvalidKey(e.to_string()))
    }
}
