//! Header names and shared defaults

use http::HeaderName;

/// Tenant override request header and tenant response header
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Rate limit identification header
pub const API_KEY_HEADER: &str = "X-API-Key";

pub const RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Proxy headers, only consulted when proxies are trusted
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";
pub const REAL_IP_HEADER: &str = "X-Real-IP";

/// Challenge sent with every 401
pub const WWW_AUTHENTICATE_VALUE: &str = "Bearer realm=\"api\"";

/// Placeholder substituted for redacted values
pub const REDACTED: &str = "[REDACTED]";

/// Number of API key characters kept in a rate limit identifier
pub const API_KEY_PREFIX_LEN: usize = 8;

/// Minimum length of an HMAC signing secret
pub const MIN_HMAC_SECRET_LEN: usize = 32;
