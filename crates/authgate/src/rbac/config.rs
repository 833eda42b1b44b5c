//! Role definitions and resolver configuration

use serde::{Deserialize, Serialize};

/// A named bundle of permissions, optionally inheriting other roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub inherits: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RoleDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
            inherits: Vec::new(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn inherits<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherits = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Permissions a route pattern demands; any one of them admits the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRequirement {
    pub pattern: String,
    pub permissions: Vec<String>,
}

impl RouteRequirement {
    #[must_use]
    pub fn new<I, S>(pattern: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pattern: pattern.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RbacConfig {
    pub roles: Vec<RoleDefinition>,
    /// Role assumed by identities that carry no roles
    pub default_role: Option<String>,
    /// Checked in order; the first matching pattern applies
    pub routes: Vec<RouteRequirement>,
}

impl RbacConfig {
    #[must_use]
    pub fn new(roles: Vec<RoleDefinition>) -> Self {
        Self {
            roles,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    #[must_use]
    pub fn with_route(mut self, requirement: RouteRequirement) -> Self {
        self.routes.push(requirement);
        self
    }
}
