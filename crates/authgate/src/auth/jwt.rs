//! Token verification with algorithm-confusion defense

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::claims::Identity;
use super::config::{JwtConfig, SigningAlgorithm};
use super::error::{Result, TokenError};
use super::extract::extract_credential;
use super::jwks::JwksCache;
use crate::Error;
use crate::context::RequestSnapshot;
use crate::pattern;

/// Header fields read before any trust decision
#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

impl RawHeader {
    fn parse(token: &str) -> Result<Self> {
        let mut segments = token.split('.');
        let (Some(header), Some(_payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::MalformedCredential(
                "expected three dot-separated segments".into(),
            ));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(header.trim_end_matches('='))
            .map_err(|e| TokenError::MalformedCredential(format!("header encoding: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TokenError::MalformedCredential(format!("header json: {e}")))
    }
}

enum KeySource {
    Static(DecodingKey),
    Jwks(Arc<JwksCache>),
}

/// Verifies bearer credentials against a single configured algorithm
pub struct TokenVerifier {
    config: Arc<JwtConfig>,
    keys: KeySource,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &self.config.algorithm)
            .field("issuer", &self.config.issuer)
            .field("uses_jwks", &matches!(self.keys, KeySource::Jwks(_)))
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Build a verifier, creating a JWKS cache when a key set URI is configured
    pub fn new(config: JwtConfig) -> crate::Result<Self> {
        config.validate()?;

        let keys = if let Some(uri) = &config.jwks_uri {
            KeySource::Jwks(Arc::new(
                JwksCache::new(uri.clone(), config.jwks_cache_ttl, config.jwks_fetch_timeout)?
                    .with_refetch_cooldown(config.jwks_refetch_cooldown),
            ))
        } else {
            KeySource::Static(static_key(&config)?)
        };

        Ok(Self::assemble(config, keys))
    }

    /// Build a verifier around an existing (possibly shared) JWKS cache
    pub fn with_jwks_cache(config: JwtConfig, cache: Arc<JwksCache>) -> crate::Result<Self> {
        if config.algorithm.is_symmetric() {
            return Err(Error::Config(format!(
                "{} cannot verify with a JWKS key set",
                config.algorithm
            )));
        }
        Ok(Self::assemble(config, KeySource::Jwks(cache)))
    }

    fn assemble(config: JwtConfig, keys: KeySource) -> Self {
        let mut validation = Validation::new(config.algorithm.to_jsonwebtoken());
        validation.leeway = config.leeway.as_secs();
        validation.validate_nbf = true;
        validation.required_spec_claims.clear();
        if config.require_exp {
            validation.required_spec_claims.insert("exp".to_string());
        }

        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer.trim_end_matches('/')]);
        }

        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&config.audience);
        }

        Self {
            config: Arc::new(config),
            keys,
            validation,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub const fn jwks_cache(&self) -> Option<&Arc<JwksCache>> {
        match &self.keys {
            KeySource::Jwks(cache) => Some(cache),
            KeySource::Static(_) => None,
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.config.algorithm
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        pattern::is_exempt(&self.config.exempt_paths, path)
    }

    /// Authenticate a request.
    ///
    /// Returns `Ok(None)` for exempt paths, which are never inspected.
    pub async fn authenticate(&self, request: &RequestSnapshot) -> Result<Option<Identity>> {
        if self.is_exempt(&request.path) {
            return Ok(None);
        }

        let token =
            extract_credential(request, &self.config).ok_or(TokenError::MissingCredential)?;
        self.verify(&token).await.map(Some)
    }

    /// Verify a raw credential and normalize its claims
    pub async fn verify(&self, token: &str) -> Result<Identity> {
        let header = RawHeader::parse(token)?;
        let expected = self.config.algorithm.as_str();

        if header.alg.eq_ignore_ascii_case("none") {
            tracing::warn!("Rejected unsigned token");
            return Err(TokenError::AlgorithmMismatch {
                declared: header.alg,
                expected,
            });
        }

        if header.alg != expected {
            tracing::warn!(declared = %header.alg, expected, "Token algorithm mismatch");
            return Err(TokenError::AlgorithmMismatch {
                declared: header.alg,
                expected,
            });
        }

        let claims = match &self.keys {
            KeySource::Static(key) => self.decode(token, key)?,
            KeySource::Jwks(cache) => {
                let key = cache
                    .get_key(header.kid.as_deref(), self.config.algorithm.to_jsonwebtoken())
                    .await?;
                self.decode(token, &key)?
            }
        };

        let identity = Identity::from_claims(claims, &self.config.tenant_claim)?;
        if identity.is_refresh_token() {
            return Err(TokenError::RefreshTokenRejected);
        }

        tracing::debug!(
            subject = %identity.subject_id,
            provider = identity.issuer_provider.as_str(),
            "Token verified"
        );
        Ok(identity)
    }

    fn decode(&self, token: &str, key: &DecodingKey) -> Result<Map<String, Value>> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, key, &self.validation)?;
        Ok(data.claims)
    }
}

fn static_key(config: &JwtConfig) -> crate::Result<DecodingKey> {
    use SigningAlgorithm as A;

    let pem = || {
        config
            .public_key_pem
            .as_deref()
            .map(str::as_bytes)
            .ok_or_else(|| Error::Config("Public key not configured".into()))
    };

    let key = match config.algorithm {
        A::HS256 | A::HS384 | A::HS512 => {
            let secret = config
                .secret
                .as_deref()
                .ok_or_else(|| Error::Config("HMAC secret not configured".into()))?;
            return Ok(DecodingKey::from_secret(secret.as_bytes()));
        }
        A::RS256 | A::RS384 | A::RS512 | A::PS256 | A::PS384 | A::PS512 => {
            DecodingKey::from_rsa_pem(pem()?)
        }
        A::ES256 | A::ES384 => DecodingKey::from_ec_pem(pem()?),
        A::EdDSA => DecodingKey::from_ed_pem(pem()?),
    };
    key.map_err(|e| Error::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
    const RSA_PRIVATE: &str = include_str!("../../tests/fixtures/rsa_private.pem");
    const RSA_PUBLIC: &str = include_str!("../../tests/fixtures/rsa_public.pem");

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn hs_token(claims: &Value, secret: &str) -> String {
        encode(
            &Header::new(jsonwebtoken::Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn rs_token(claims: &Value) -> String {
        encode(
            &Header::new(jsonwebtoken::Algorithm::RS256),
            claims,
            &EncodingKey::from_rsa_pem(RSA_PRIVATE.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    fn unsigned_token(alg: &str, claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({ "alg": alg, "typ": "JWT" }).to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.")
    }

    fn hs_verifier() -> TokenVerifier {
        TokenVerifier::new(JwtConfig::hmac(SECRET)).unwrap()
    }

    fn rs_verifier() -> TokenVerifier {
        TokenVerifier::new(JwtConfig::public_key(SigningAlgorithm::RS256, RSA_PUBLIC)).unwrap()
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let token = hs_token(
            &json!({ "sub": "user123", "exp": now() + 3600, "roles": ["admin"], "tenant_id": "t1" }),
            SECRET,
        );
        let identity = hs_verifier().verify(&token).await.unwrap();

        assert_eq!(identity.subject_id, "user123");
        assert!(identity.has_role("admin"));
        assert_eq!(identity.tenant_claim.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let token = hs_token(&json!({ "sub": "u", "exp": now() - 60 }), SECRET);
        let result = hs_verifier().verify(&token).await;
        assert!(matches!(result, Err(TokenError::ExpiredCredential)));
    }

    #[tokio::test]
    async fn test_expiring_soon_with_zero_leeway_is_valid() {
        let token = hs_token(&json!({ "sub": "u", "exp": now() + 60 }), SECRET);
        assert!(hs_verifier().verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_leeway_tolerates_skew() {
        let verifier = TokenVerifier::new(
            JwtConfig::hmac(SECRET).with_leeway(Duration::from_secs(120)),
        )
        .unwrap();
        let token = hs_token(&json!({ "sub": "u", "exp": now() - 60 }), SECRET);
        assert!(verifier.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_not_before_in_future() {
        let token = hs_token(
            &json!({ "sub": "u", "exp": now() + 3600, "nbf": now() + 600 }),
            SECRET,
        );
        let result = hs_verifier().verify(&token).await;
        assert!(matches!(result, Err(TokenError::NotYetValid)));
    }

    #[tokio::test]
    async fn test_missing_exp_rejected_by_default() {
        let token = hs_token(&json!({ "sub": "u" }), SECRET);
        let result = hs_verifier().verify(&token).await;
        assert!(matches!(result, Err(TokenError::MalformedCredential(_))));
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let token = hs_token(
            &json!({ "sub": "u", "exp": now() + 3600 }),
            "wrong-secret-key-at-least-32-bytes-long",
        );
        let result = hs_verifier().verify(&token).await;
        assert!(matches!(result, Err(TokenError::SignatureInvalid)));
    }

    #[tokio::test]
    async fn test_issuer_and_audience() {
        let verifier = TokenVerifier::new(
            JwtConfig::hmac(SECRET)
                .with_issuer("https://auth.example.com/")
                .with_audience(vec!["api".into()]),
        )
        .unwrap();

        let good = hs_token(
            &json!({ "sub": "u", "exp": now() + 3600, "iss": "https://auth.example.com", "aud": "api" }),
            SECRET,
        );
        assert!(verifier.verify(&good).await.is_ok());

        let wrong_iss = hs_token(
            &json!({ "sub": "u", "exp": now() + 3600, "iss": "https://evil.example.com", "aud": "api" }),
            SECRET,
        );
        assert!(matches!(
            verifier.verify(&wrong_iss).await,
            Err(TokenError::InvalidIssuer)
        ));

        let wrong_aud = hs_token(
            &json!({ "sub": "u", "exp": now() + 3600, "iss": "https://auth.example.com", "aud": "web" }),
            SECRET,
        );
        assert!(matches!(
            verifier.verify(&wrong_aud).await,
            Err(TokenError::InvalidAudience)
        ));
    }

    #[tokio::test]
    async fn test_none_algorithm_always_rejected() {
        let claims = json!({ "sub": "u", "exp": now() + 3600 });
        for alg in ["none", "None", "NONE", "nOnE"] {
            let token = unsigned_token(alg, &claims);
            assert!(matches!(
                hs_verifier().verify(&token).await,
                Err(TokenError::AlgorithmMismatch { .. })
            ));
            assert!(matches!(
                rs_verifier().verify(&token).await,
                Err(TokenError::AlgorithmMismatch { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_symmetric_token_against_asymmetric_verifier() {
        // Classic confusion: HMAC keyed with the public key PEM
        let claims = json!({ "sub": "attacker", "exp": now() + 3600 });
        let token = hs_token(&claims, RSA_PUBLIC);
        let result = rs_verifier().verify(&token).await;
        assert!(matches!(
            result,
            Err(TokenError::AlgorithmMismatch { ref declared, expected: "RS256" }) if declared == "HS256"
        ));
    }

    #[tokio::test]
    async fn test_asymmetric_token_against_symmetric_verifier() {
        let token = rs_token(&json!({ "sub": "u", "exp": now() + 3600 }));
        let result = hs_verifier().verify(&token).await;
        assert!(matches!(result, Err(TokenError::AlgorithmMismatch { .. })));
    }

    #[test]
    fn test_algorithm_reports_configured_value() {
        assert_eq!(hs_verifier().algorithm(), SigningAlgorithm::HS256);
        assert_eq!(rs_verifier().algorithm(), SigningAlgorithm::RS256);
    }

    #[tokio::test]
    async fn test_rs256_round_trip() {
        let token = rs_token(&json!({ "sub": "u", "exp": now() + 3600 }));
        let identity = rs_verifier().verify(&token).await.unwrap();
        assert_eq!(identity.subject_id, "u");
    }

    #[tokio::test]
    async fn test_refresh_token_rejected() {
        let token = hs_token(
            &json!({ "sub": "u", "exp": now() + 3600, "token_type": "refresh" }),
            SECRET,
        );
        assert!(matches!(
            hs_verifier().verify(&token).await,
            Err(TokenError::RefreshTokenRejected)
        ));
    }

    #[tokio::test]
    async fn test_malformed_tokens() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.sig"] {
            assert!(matches!(
                hs_verifier().verify(token).await,
                Err(TokenError::MalformedCredential(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_authenticate_exempt_and_missing() {
        let verifier = hs_verifier();
        let health = RequestSnapshot::new(http::Method::GET, "/health");
        assert!(verifier.authenticate(&health).await.unwrap().is_none());

        let sso = RequestSnapshot::new(http::Method::GET, "/auth/sso/google/callback");
        assert!(verifier.authenticate(&sso).await.unwrap().is_none());

        let protected = RequestSnapshot::new(http::Method::GET, "/api/users");
        assert!(matches!(
            verifier.authenticate(&protected).await,
            Err(TokenError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_with_bearer() {
        let token = hs_token(&json!({ "sub": "u", "exp": now() + 3600 }), SECRET);
        let request = RequestSnapshot::new(http::Method::GET, "/api/users")
            .with_header("authorization", &format!("Bearer {token}"));
        let identity = hs_verifier().authenticate(&request).await.unwrap().unwrap();
        assert_eq!(identity.subject_id, "u");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(TokenVerifier::new(JwtConfig::hmac("short")).is_err());
        assert!(
            TokenVerifier::new(JwtConfig::public_key(SigningAlgorithm::RS256, "not a pem"))
                .is_err()
        );
    }
}
