//! JWKS fetching and caching

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use url::Url;

use super::error::{Result, TokenError};
use crate::Error;

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC, OKP)
    pub kty: String,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// Key usage
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC / OKP components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Clone)]
struct JwkEntry {
    key: DecodingKey,
    algorithm: Algorithm,
}

impl std::fmt::Debug for JwkEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkEntry")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Keys published together; swapped as a unit on refresh
#[derive(Debug, Default)]
struct KeySnapshot {
    named: HashMap<String, JwkEntry>,
    unnamed: Vec<JwkEntry>,
    fetched_at: Option<Instant>,
}

impl KeySnapshot {
    fn find(&self, kid: Option<&str>, alg: Algorithm) -> Option<DecodingKey> {
        if let Some(kid) = kid {
            return self
                .named
                .get(kid)
                .filter(|entry| entry.algorithm == alg)
                .map(|entry| entry.key.clone());
        }

        self.unnamed
            .iter()
            .chain(self.named.values())
            .find(|entry| entry.algorithm == alg)
            .map(|entry| entry.key.clone())
    }
}

/// Default minimum spacing between `kid`-miss refetches
pub const DEFAULT_REFETCH_COOLDOWN: Duration = Duration::from_secs(10);

/// Thread-safe JWKS cache
pub struct JwksCache {
    snapshot: RwLock<KeySnapshot>,
    jwks_uri: Url,
    client: reqwest::Client,
    ttl: Duration,
    refetch_cooldown: Duration,
    last_attempt: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_uri", &self.jwks_uri)
            .field("ttl", &self.ttl)
            .field("refetch_cooldown", &self.refetch_cooldown)
            .field("keys_count", &self.keys_count())
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    /// Create a cache; `fetch_timeout` bounds every remote fetch
    pub fn new(jwks_uri: Url, ttl: Duration, fetch_timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build JWKS client: {e}")))?;

        Ok(Self {
            snapshot: RwLock::new(KeySnapshot::default()),
            jwks_uri,
            client,
            ttl,
            refetch_cooldown: DEFAULT_REFETCH_COOLDOWN,
            last_attempt: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn with_refetch_cooldown(mut self, cooldown: Duration) -> Self {
        self.refetch_cooldown = cooldown;
        self
    }

    /// Get a key for validation.
    ///
    /// A stale cache is refreshed first. A miss on a fresh cache triggers exactly
    /// one refetch, unless another fetch was attempted within the refetch
    /// cooldown; a miss after that is final.
    pub async fn get_key(&self, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey> {
        let mut refreshed = false;
        if self.needs_refresh() {
            self.refresh().await?;
            refreshed = true;
        }

        if let Some(key) = self.snapshot.read().find(kid, alg) {
            return Ok(key);
        }

        if !refreshed {
            if self.in_cooldown() {
                tracing::debug!(kid = ?kid, "JWKS cache miss, refetch suppressed by cooldown");
            } else {
                tracing::debug!(kid = ?kid, "JWKS cache miss, refetching");
                self.refresh().await?;
                if let Some(key) = self.snapshot.read().find(kid, alg) {
                    return Ok(key);
                }
            }
        }

        tracing::warn!(kid = ?kid, alg = ?alg, "No JWKS key matches token");
        Err(TokenError::KeyNotFound(
            kid.unwrap_or("<none>").to_string(),
        ))
    }

    /// Refresh JWKS from remote
    pub async fn refresh(&self) -> Result<()> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Refreshing JWKS");
        *self.last_attempt.lock() = Some(Instant::now());

        let response = self
            .client
            .get(self.jwks_uri.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TokenError::KeyUnavailable(e.to_string()))?;

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| TokenError::KeyUnavailable(format!("JWKS parse failed: {e}")))?;

        let count = self.install(&jwks);
        tracing::info!(keys_count = count, "JWKS refreshed successfully");
        Ok(())
    }

    /// Replace the cached keys with `jwks`; unusable keys are skipped
    pub fn install(&self, jwks: &JwkSet) -> usize {
        let mut snapshot = KeySnapshot {
            fetched_at: Some(Instant::now()),
            ..KeySnapshot::default()
        };

        for jwk in &jwks.keys {
            match decode_jwk(jwk) {
                Ok(Some((key, algorithm))) => {
                    let entry = JwkEntry { key, algorithm };
                    if let Some(kid) = &jwk.kid {
                        snapshot.named.insert(kid.clone(), entry);
                    } else {
                        snapshot.unnamed.push(entry);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(kid = ?jwk.kid, error = %e, "Skipping malformed JWK");
                }
            }
        }

        let count = snapshot.named.len() + snapshot.unnamed.len();
        *self.snapshot.write() = snapshot;
        count
    }

    fn needs_refresh(&self) -> bool {
        self.snapshot
            .read()
            .fetched_at
            .is_none_or(|t| t.elapsed() > self.ttl)
    }

    fn in_cooldown(&self) -> bool {
        self.last_attempt
            .lock()
            .is_some_and(|t| t.elapsed() < self.refetch_cooldown)
    }

    pub fn keys_count(&self) -> usize {
        let snapshot = self.snapshot.read();
        snapshot.named.len() + snapshot.unnamed.len()
    }
}

fn decode_jwk(jwk: &Jwk) -> std::result::Result<Option<(DecodingKey, Algorithm)>, String> {
    if jwk.r#use.as_deref().is_some_and(|u| u != "sig") {
        return Ok(None);
    }

    let alg = match jwk.alg.as_deref() {
        Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some("PS256") => Algorithm::PS256,
        Some("PS384") => Algorithm::PS384,
        Some("PS512") => Algorithm::PS512,
        Some("ES256") => Algorithm::ES256,
        Some("ES384") => Algorithm::ES384,
        Some("EdDSA") => Algorithm::EdDSA,
        None => {
            // Infer from key type
            match (jwk.kty.as_str(), jwk.crv.as_deref()) {
                ("RSA", _) => Algorithm::RS256,
                ("EC", Some("P-256")) => Algorithm::ES256,
                ("EC", Some("P-384")) => Algorithm::ES384,
                ("OKP", Some("Ed25519")) => Algorithm::EdDSA,
                _ => return Ok(None),
            }
        }
        _ => return Ok(None),
    };

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().ok_or("missing 'n' in RSA key")?;
            let e = jwk.e.as_deref().ok_or("missing 'e' in RSA key")?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| format!("invalid RSA components: {e}"))?
        }
        "EC" => {
            let x = jwk.x.as_deref().ok_or("missing 'x' in EC key")?;
            let y = jwk.y.as_deref().ok_or("missing 'y' in EC key")?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| format!("invalid EC components: {e}"))?
        }
        "OKP" => {
            let x = jwk.x.as_deref().ok_or("missing 'x' in OKP key")?;
            DecodingKey::from_ed_components(x)
                .map_err(|e| format!("invalid OKP components: {e}"))?
        }
        other => {
            tracing::debug!(kty = other, "Skipping unsupported key type");
            return Ok(None);
        }
    };

    Ok(Some((key, alg)))
}

/// Background JWKS refresh task builder
pub struct JwksRefreshTask {
    cache: Arc<JwksCache>,
    interval: Duration,
}

impl std::fmt::Debug for JwksRefreshTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksRefreshTask")
            .field("cache", &self.cache)
            .field("interval", &self.interval)
            .finish()
    }
}

impl JwksRefreshTask {
    #[must_use]
    pub const fn new(cache: Arc<JwksCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub fn spawn(
        self,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.cache.refresh().await {
                            tracing::warn!(error = %e, "Background JWKS refresh failed");
                        }
                    }
                    () = shutdown.cancelled() => {
                        tracing::debug!("JWKS refresh task shutting down");
                        break;
                    }
                }
            }
        })
    }
}
