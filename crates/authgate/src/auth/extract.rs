//! Credential extraction from an inbound request

use std::borrow::Cow;

use super::config::JwtConfig;
use crate::context::RequestSnapshot;

const BEARER_PREFIX: &str = "bearer ";

/// Locate the raw token: bearer header, then cookie, then query parameter.
pub fn extract_credential<'a>(
    request: &'a RequestSnapshot,
    config: &JwtConfig,
) -> Option<Cow<'a, str>> {
    if let Some(token) = request
        .header(&config.token_header)
        .and_then(strip_bearer)
    {
        return Some(Cow::Borrowed(token));
    }

    if let Some(name) = config.token_cookie.as_deref()
        && let Some(token) = request.cookie(name).filter(|t| !t.is_empty())
    {
        return Some(Cow::Borrowed(token));
    }

    if let Some(name) = config.token_query_param.as_deref()
        && let Some(token) = request.query_param(name).filter(|t| !t.is_empty())
    {
        return Some(Cow::Owned(token));
    }

    None
}

fn strip_bearer(value: &str) -> Option<&str> {
    let scheme = value.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}
