//! Role-based access control with inheritance and wildcard permissions

mod config;
mod error;
mod permission;
mod resolver;
mod roles;

pub use config::{RbacConfig, RoleDefinition, RouteRequirement};
pub use error::PermissionError;
pub use permission::{EffectivePermissionSet, matches_permission};
pub use resolver::{PermissionResolver, RbacStats, RoleStats};
