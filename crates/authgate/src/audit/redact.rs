//! Header, field and PII-pattern redaction

use std::collections::HashSet;

use http::HeaderMap;
use regex::Regex;
use serde_json::{Map, Value};

use super::config::AuditConfig;

const PII_PATTERNS: &[(&str, &str)] = &[
    (
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        "[EMAIL_REDACTED]",
    ),
    (r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b", "[CARD_REDACTED]"),
    (r"\b\d{3}[-.]?\d{2}[-.]?\d{4}\b", "[SSN_REDACTED]"),
];

const TRUNCATED_SUFFIX: &str = "...[truncated]";

#[derive(Debug, Clone)]
pub struct Redactor {
    headers: HashSet<String>,
    fields: HashSet<String>,
    replacement: String,
    patterns: Vec<(Regex, &'static str)>,
}

impl Redactor {
    #[must_use]
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            headers: config.redact_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
            fields: config.redact_fields.iter().map(|f| f.to_lowercase()).collect(),
            replacement: config.redact_replacement.clone(),
            patterns: PII_PATTERNS
                .iter()
                .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, *label)))
                .collect(),
        }
    }

    fn is_sensitive_field(&self, name: &str) -> bool {
        self.fields.contains(&name.to_lowercase())
    }

    /// Header map as JSON with sensitive values replaced
    pub fn headers(&self, headers: &HeaderMap) -> Map<String, Value> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if self.headers.contains(name.as_str()) {
                    self.replacement.clone()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name.as_str().to_string(), Value::String(value))
            })
            .collect()
    }

    /// Query parameters with sensitive names replaced
    pub fn query(&self, pairs: Vec<(String, String)>) -> Map<String, Value> {
        pairs
            .into_iter()
            .map(|(name, value)| {
                let value = if self.is_sensitive_field(&name) {
                    self.replacement.clone()
                } else {
                    value
                };
                (name, Value::String(value))
            })
            .collect()
    }

    /// Recursive field redaction plus PII patterns in every string
    pub fn value(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| {
                        let value = if self.is_sensitive_field(&key) {
                            Value::String(self.replacement.clone())
                        } else {
                            self.value(value)
                        };
                        (key, value)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.value(v)).collect()),
            Value::String(text) => Value::String(self.text(&text)),
            other => other,
        }
    }

    pub fn text(&self, text: &str) -> String {
        self.patterns
            .iter()
            .fold(text.to_string(), |acc, (re, label)| {
                re.replace_all(&acc, *label).into_owned()
            })
    }

    /// Redact, then cap the serialized size at `max_len` bytes
    pub fn body(&self, body: Value, max_len: usize) -> Value {
        let redacted = self.value(body);
        let serialized = redacted.to_string();
        if serialized.len() <= max_len {
            return redacted;
        }

        let mut cut = max_len;
        while !serialized.is_char_boundary(cut) {
            cut -= 1;
        }
        Value::String(format!("{}{TRUNCATED_SUFFIX}", &serialized[..cut]))
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use serde_json::json;

    use super::*;

    fn redactor() -> Redactor {
        Redactor::new(&AuditConfig::default())
    }

    #[test]
    fn test_header_redaction_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("x-api-key", HeaderValue::from_static("sk_live"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let redacted = redactor().headers(&headers);
        assert_eq!(redacted["authorization"], "[REDACTED]");
        assert_eq!(redacted["x-api-key"], "[REDACTED]");
        assert_eq!(redacted["accept"], "application/json");
    }

    #[test]
    fn test_nested_field_redaction() {
        let body = json!({
            "user": {
                "name": "Jane",
                "Password": "hunter2",
                "cards": [{ "card_number": "4111111111111111", "label": "work" }]
            },
            "Access_Token": "abc"
        });
        let redacted = redactor().value(body);

        assert_eq!(redacted["user"]["name"], "Jane");
        assert_eq!(redacted["user"]["Password"], "[REDACTED]");
        assert_eq!(redacted["user"]["cards"][0]["card_number"], "[REDACTED]");
        assert_eq!(redacted["user"]["cards"][0]["label"], "work");
        assert_eq!(redacted["Access_Token"], "[REDACTED]");
    }

    #[test]
    fn test_pii_patterns() {
        let r = redactor();
        assert_eq!(r.text("contact jane@example.com now"), "contact [EMAIL_REDACTED] now");
        assert_eq!(r.text("ssn 123-45-6789"), "ssn [SSN_REDACTED]");
        assert_eq!(r.text("card 4111 1111 1111 1111"), "card [CARD_REDACTED]");
        assert_eq!(r.text("nothing here"), "nothing here");
    }

    #[test]
    fn test_query_redaction() {
        let redacted = redactor().query(vec![
            ("token".into(), "abc".into()),
            ("page".into(), "2".into()),
        ]);
        assert_eq!(redacted["token"], "[REDACTED]");
        assert_eq!(redacted["page"], "2");
    }

    #[test]
    fn test_body_redacted_before_truncation() {
        let secret = "s".repeat(64);
        let body = json!({ "password": secret, "note": "x".repeat(200) });
        let capped = redactor().body(body, 40);

        let text = capped.as_str().unwrap();
        assert!(text.ends_with(TRUNCATED_SUFFIX));
        assert!(!text.contains("sss"));

        let small = redactor().body(json!({ "a": 1 }), 1024);
        assert_eq!(small, json!({ "a": 1 }));
    }
}
