//! Claim normalization into the canonical [`Identity`]

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{Result, TokenError};

/// Claims consulted for the tenant hint after the configured one
const TENANT_FALLBACK_CLAIMS: &[&str] = &["tenant_id", "tid", "organization_id"];

/// Issuing identity provider, inferred from `iss`. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    #[default]
    Local,
    Azure,
    Google,
    Apple,
    GitHub,
}

impl IdentityProvider {
    #[must_use]
    pub fn from_issuer(issuer: Option<&str>) -> Self {
        let Some(issuer) = issuer else {
            return Self::Local;
        };
        if issuer.contains("login.microsoftonline.com") {
            Self::Azure
        } else if issuer.contains("accounts.google.com") {
            Self::Google
        } else if issuer.contains("appleid.apple.com") {
            Self::Apple
        } else if issuer.contains("github.com") {
            Self::GitHub
        } else {
            Self::Local
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Azure => "azure",
            Self::Google => "google",
            Self::Apple => "apple",
            Self::GitHub => "github",
        }
    }
}

/// Verified requester, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub subject_id: String,
    pub email: Option<String>,
    pub roles: BTreeSet<String>,
    pub direct_permissions: BTreeSet<String>,
    pub tenant_claim: Option<String>,
    pub issuer_provider: IdentityProvider,
    pub token_type: Option<String>,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
    #[serde(skip)]
    pub raw_claims: Map<String, Value>,
}

impl Identity {
    /// Normalize verified claims.
    ///
    /// Subject comes from `sub`, `user_id` or `uid`; roles from `roles` and `role`;
    /// permissions from `permissions` and the space-delimited `scope`.
    pub fn from_claims(claims: Map<String, Value>, tenant_claim: &str) -> Result<Self> {
        let subject_id = ["sub", "user_id", "uid"]
            .iter()
            .find_map(|name| claims.get(*name).and_then(scalar_string))
            .ok_or_else(|| TokenError::MalformedCredential("no subject claim".into()))?;

        let email = ["email", "preferred_username"]
            .iter()
            .find_map(|name| claims.get(*name).and_then(scalar_string));

        let mut roles = BTreeSet::new();
        for name in ["roles", "role"] {
            if let Some(value) = claims.get(name) {
                roles.extend(string_list(value, false));
            }
        }

        let mut direct_permissions = BTreeSet::new();
        for name in ["permissions", "scope"] {
            if let Some(value) = claims.get(name) {
                direct_permissions.extend(string_list(value, true));
            }
        }

        let tenant = std::iter::once(tenant_claim)
            .chain(TENANT_FALLBACK_CLAIMS.iter().copied())
            .find_map(|name| claims.get(name).and_then(scalar_string));

        let issuer_provider =
            IdentityProvider::from_issuer(claims.get("iss").and_then(Value::as_str));

        Ok(Self {
            subject_id,
            email,
            roles,
            direct_permissions,
            tenant_claim: tenant,
            issuer_provider,
            token_type: claims
                .get("token_type")
                .and_then(Value::as_str)
                .map(String::from),
            issued_at: claims.get("iat").and_then(Value::as_i64),
            expires_at: claims.get("exp").and_then(Value::as_i64),
            raw_claims: claims,
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }

    /// Raw claim lookup
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw_claims.get(name)
    }

    /// Raw claim as a string, numbers included
    pub fn claim_str(&self, name: &str) -> Option<String> {
        self.claim(name).and_then(scalar_string)
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_type.as_deref() == Some("refresh")
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A claim holding one string or many. Strings split on whitespace when `split` is set.
fn string_list(value: &Value, split: bool) -> Vec<String> {
    match value {
        Value::String(s) if split => s.split_whitespace().map(String::from).collect(),
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => vec![],
    }
}
