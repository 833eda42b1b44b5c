//! Admission outcome and its response headers

use http::header::RETRY_AFTER;
use http::{HeaderMap, HeaderValue};
use serde::Serialize;

use super::store::{Acquired, BucketLimit};
use crate::constants::{
    RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Bucket capacity (requests per minute plus burst)
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the bucket is full again
    pub reset_at: i64,
    pub retry_after: Option<u64>,
    pub identifier: String,
}

impl RateLimitDecision {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn from_bucket(
        identifier: &str,
        limit: &BucketLimit,
        acquired: Acquired,
        now_unix: i64,
    ) -> Self {
        let tokens = acquired.tokens.clamp(0.0, limit.capacity);
        let refill_secs = ((limit.capacity - tokens) / limit.refill_per_sec).ceil() as i64;
        let retry_after = (!acquired.allowed)
            .then(|| (((1.0 - tokens) / limit.refill_per_sec).ceil() as u64).max(1));

        Self {
            allowed: acquired.allowed,
            limit: limit.capacity as u32,
            remaining: tokens.floor() as u32,
            reset_at: now_unix.saturating_add(refill_secs),
            retry_after,
            identifier: identifier.to_string(),
        }
    }

    /// `X-RateLimit-*`, plus `Retry-After` on rejection
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from(self.reset_at));

        if let Some(retry_after) = self.retry_after.filter(|_| !self.allowed) {
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_decision() {
        let limit = BucketLimit::new(60, 0);
        let decision = RateLimitDecision::from_bucket(
            "user:1",
            &limit,
            Acquired {
                allowed: true,
                tokens: 59.0,
            },
            1_000,
        );
        assert_eq!(decision.limit, 60);
        assert_eq!(decision.remaining, 59);
        assert_eq!(decision.reset_at, 1_001);
        assert!(decision.retry_after.is_none());
    }

    #[test]
    fn test_denied_decision_and_headers() {
        let limit = BucketLimit::new(10, 0);
        let decision = RateLimitDecision::from_bucket(
            "ip:10.0.0.1",
            &limit,
            Acquired {
                allowed: false,
                tokens: 0.5,
            },
            1_000,
        );
        // 0.5 tokens missing at 1/6 token per second
        assert_eq!(decision.retry_after, Some(3));
        assert_eq!(decision.remaining, 0);

        let mut headers = HeaderMap::new();
        decision.apply_headers(&mut headers);
        assert_eq!(headers["x-ratelimit-limit"], "10");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["retry-after"], "3");
        assert_eq!(headers["x-ratelimit-reset"], "1057");
    }
}
