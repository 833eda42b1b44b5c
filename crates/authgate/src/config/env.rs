//! Environment variable overrides

use std::net::IpAddr;

use url::Url;

use super::builder::ConfigBuilder;
use crate::auth::SigningAlgorithm;
use crate::{Error, Result};

/// Environment variable names
mod vars {
    pub const JWT_SECRET: &str = "AUTHGATE_JWT_SECRET";
    pub const JWT_ALGORITHM: &str = "AUTHGATE_JWT_ALGORITHM";
    pub const JWT_ISSUER: &str = "AUTHGATE_JWT_ISSUER";
    pub const JWKS_URI: &str = "AUTHGATE_JWKS_URI";
    pub const REDIS_URL: &str = "AUTHGATE_REDIS_URL";
    pub const HTTP_HOST: &str = "AUTHGATE_HTTP_HOST";
    pub const HTTP_PORT: &str = "AUTHGATE_HTTP_PORT";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "AUTHGATE_JSON_LOGS";
}

/// Apply overrides from the process environment
pub fn load_from_env(builder: ConfigBuilder) -> Result<ConfigBuilder> {
    load_from_lookup(builder, |name| std::env::var(name).ok())
}

/// Apply overrides from an arbitrary variable source
pub fn load_from_lookup<F>(mut builder: ConfigBuilder, lookup: F) -> Result<ConfigBuilder>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(algorithm) = lookup(vars::JWT_ALGORITHM) {
        let algorithm: SigningAlgorithm = algorithm.parse()?;
        builder = builder.jwt_algorithm(algorithm);
    }

    if let Some(secret) = lookup(vars::JWT_SECRET) {
        builder = builder.jwt_secret(secret);
    }

    if let Some(issuer) = lookup(vars::JWT_ISSUER) {
        builder = builder.jwt_issuer(issuer);
    }

    if let Some(uri) = lookup(vars::JWKS_URI) {
        let uri = Url::parse(&uri)
            .map_err(|e| Error::Config(format!("Invalid {}: {e}", vars::JWKS_URI)))?;
        builder = builder.jwks_uri(uri);
    }

    if let Some(url) = lookup(vars::REDIS_URL) {
        builder = builder.redis_url(url);
    }

    if let Some(host) = lookup(vars::HTTP_HOST)
        && let Ok(host) = host.parse::<IpAddr>()
    {
        builder = builder.http_host(host);
    }

    if let Some(port) = lookup(vars::HTTP_PORT)
        && let Ok(port) = port.parse::<u16>()
    {
        builder = builder.http_port(port);
    }

    if let Some(level) = lookup(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Some(json) = lookup(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&json));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
