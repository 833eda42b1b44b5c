//! Permission resolution over a hot-swappable role table

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;

use super::config::{RbacConfig, RoleDefinition, RouteRequirement};
use super::error::PermissionError;
use super::permission::EffectivePermissionSet;
use super::roles::RoleTable;
use crate::auth::Identity;
use crate::pattern;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleStats {
    pub direct_permissions: usize,
    pub total_permissions: usize,
    pub inherits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RbacStats {
    pub total_roles: usize,
    pub unique_permissions: usize,
    pub roles: BTreeMap<String, RoleStats>,
    pub default_role: Option<String>,
}

/// Expands identities into effective permission sets.
///
/// Readers load the current table without locking. Mutations are serialized,
/// validated on a fresh table, then published with a single store.
pub struct PermissionResolver {
    table: ArcSwap<RoleTable>,
    write_lock: Mutex<()>,
    default_role: Option<String>,
    routes: Vec<RouteRequirement>,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("roles", &self.table.load().len())
            .field("default_role", &self.default_role)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl PermissionResolver {
    pub fn new(config: RbacConfig) -> Result<Self> {
        let table = RoleTable::build(config.roles)?;

        if let Some(default) = &config.default_role
            && !table.contains(default)
        {
            return Err(Error::UnknownRole(default.clone()));
        }

        tracing::info!(
            roles = table.len(),
            default_role = config.default_role.as_deref().unwrap_or("none"),
            "Role table loaded"
        );

        Ok(Self {
            table: ArcSwap::from_pointee(table),
            write_lock: Mutex::new(()),
            default_role: config.default_role,
            routes: config.routes,
        })
    }

    /// Union of the identity's role closures and its direct permissions
    pub fn resolve(&self, identity: &Identity) -> EffectivePermissionSet {
        let table = self.table.load();
        let mut effective = EffectivePermissionSet::new();

        let defaulted = self.default_role.as_ref().filter(|_| identity.roles.is_empty());
        let roles = identity.roles.iter().chain(defaulted);

        for role in roles {
            match table.closure(role) {
                Some(closure) => effective.extend(closure),
                None => tracing::debug!(role = %role, "Ignoring undefined role"),
            }
        }
        effective.extend(&identity.direct_permissions);
        effective
    }

    pub fn check(&self, effective: &EffectivePermissionSet, required: &str) -> bool {
        effective.allows(required)
    }

    pub fn require(
        &self,
        effective: &EffectivePermissionSet,
        required: &str,
    ) -> std::result::Result<(), PermissionError> {
        if self.check(effective, required) {
            return Ok(());
        }
        Err(PermissionError::InsufficientPermission {
            required: required.to_string(),
        })
    }

    /// Succeeds if any of `required` is held
    pub fn require_any<S: AsRef<str>>(
        &self,
        effective: &EffectivePermissionSet,
        required: &[S],
    ) -> std::result::Result<(), PermissionError> {
        if effective.allows_any(required) {
            return Ok(());
        }
        Err(PermissionError::InsufficientPermission {
            required: required
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(" | "),
        })
    }

    pub fn require_role<S: AsRef<str>>(
        &self,
        identity: &Identity,
        roles: &[S],
    ) -> std::result::Result<(), PermissionError> {
        if identity.has_any_role(roles) {
            return Ok(());
        }
        Err(PermissionError::InsufficientRole {
            required: roles.iter().map(|r| r.as_ref().to_string()).collect(),
        })
    }

    /// Permissions demanded by the first route rule matching `path`
    pub fn route_requirement(&self, path: &str) -> Option<&[String]> {
        self.routes
            .iter()
            .find(|rule| rule.pattern == path || pattern::glob_match(&rule.pattern, path))
            .map(|rule| rule.permissions.as_slice())
    }

    /// Closure of a single role
    pub fn role_permissions(&self, role: &str) -> Option<BTreeSet<String>> {
        self.table.load().closure(role).cloned()
    }

    pub fn role(&self, name: &str) -> Option<RoleDefinition> {
        self.table.load().get(name).cloned()
    }

    /// Add or replace a role. The table is unchanged if validation fails.
    pub fn add_role(&self, role: RoleDefinition) -> Result<()> {
        let _guard = self.write_lock.lock();
        let current = self.table.load();

        let name = role.name.clone();
        let mut definitions: Vec<RoleDefinition> = current
            .definitions()
            .filter(|def| def.name != role.name)
            .cloned()
            .collect();
        definitions.push(role);

        let table = RoleTable::build(definitions)?;
        self.table.store(Arc::new(table));
        tracing::info!(role = %name, "Role added");
        Ok(())
    }

    /// Remove a role nothing else inherits from
    pub fn remove_role(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let current = self.table.load();

        if !current.contains(name) {
            return Err(Error::UnknownRole(name.to_string()));
        }
        if let Some(dependent) = current.dependents(name).first() {
            return Err(Error::RoleInUse {
                role: name.to_string(),
                inherited_by: (*dependent).to_string(),
            });
        }
        if self.default_role.as_deref() == Some(name) {
            return Err(Error::Config(format!(
                "Role '{name}' is the default role and cannot be removed"
            )));
        }

        let definitions = current
            .definitions()
            .filter(|def| def.name != name)
            .cloned()
            .collect();
        let table = RoleTable::build(definitions)?;
        self.table.store(Arc::new(table));
        tracing::info!(role = %name, "Role removed");
        Ok(())
    }

    pub fn stats(&self) -> RbacStats {
        let table = self.table.load();
        let mut unique = BTreeSet::new();
        let mut roles = BTreeMap::new();

        for def in table.definitions() {
            unique.extend(def.permissions.iter().map(String::as_str));
            roles.insert(
                def.name.clone(),
                RoleStats {
                    direct_permissions: def.permissions.len(),
                    total_permissions: table.closure(&def.name).map_or(0, BTreeSet::len),
                    inherits: def.inherits.clone(),
                },
            );
        }

        RbacStats {
            total_roles: table.len(),
            unique_permissions: unique.len(),
            roles,
            default_role: self.default_role.clone(),
        }
    }
}
