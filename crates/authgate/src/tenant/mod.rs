//! Multi-tenant request isolation

mod config;
mod error;
mod resolver;
mod scope;
mod store;

pub use config::TenantConfig;
pub use error::TenantError;
pub use resolver::TenantResolver;
pub use scope::{current_tenant, spawn_with_tenant, with_tenant};
pub use store::{CustomTenantResolver, InMemoryTenantStore, TenantInfo, TenantStore, UserDirectory};
