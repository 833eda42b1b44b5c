//! Permission strings and wildcard matching
//!
//! Permissions have the form `action:resource`. Either half may be `*`, and a
//! bare `*` grants everything.

use std::collections::BTreeSet;

use serde::Serialize;

/// Does `granted` satisfy `required`?
pub fn matches_permission(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    let (Some((g_action, g_resource)), Some((r_action, r_resource))) =
        (granted.split_once(':'), required.split_once(':'))
    else {
        return false;
    };

    if g_action == "*" {
        return g_resource == "*" || g_resource == r_resource;
    }
    if g_resource == "*" {
        return g_action == r_action;
    }
    false
}

/// Closure of an identity's roles plus its direct grants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EffectivePermissionSet {
    permissions: BTreeSet<String>,
}

impl EffectivePermissionSet {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            permissions: BTreeSet::new(),
        }
    }

    /// Whether any granted permission satisfies `required`
    pub fn allows(&self, required: &str) -> bool {
        self.permissions.contains(required)
            || self
                .permissions
                .iter()
                .any(|granted| matches_permission(granted, required))
    }

    pub fn allows_any<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().any(|p| self.allows(p.as_ref()))
    }

    /// Literal membership, no wildcard expansion
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub(crate) fn extend<'a>(&mut self, permissions: impl IntoIterator<Item = &'a String>) {
        self.permissions.extend(permissions.into_iter().cloned());
    }
}

impl FromIterator<String> for EffectivePermissionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}
