//! TOML configuration file loading

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::builder::ConfigBuilder;
use crate::audit::{AuditBackendConfig, AuditConfig, DEFAULT_MEMORY_CAPACITY};
use crate::auth::{JwtConfig, SigningAlgorithm};
use crate::rate_limit::{RateLimitBackend, RateLimitConfig, RouteLimit, RouteOverride};
use crate::rbac::{RbacConfig, RoleDefinition, RouteRequirement};
use crate::tenant::TenantConfig;
use crate::{Error, Result};

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./authgate.toml",
    "~/.config/authgate/config.toml",
    "/etc/authgate/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(server) = config.server {
        if let Some(host) = server.host {
            let host = host
                .parse::<IpAddr>()
                .map_err(|e| Error::Config(format!("Invalid server.host '{host}': {e}")))?;
            builder = builder.http_host(host);
        }
        if let Some(port) = server.port {
            builder = builder.http_port(port);
        }
        if let Some(secs) = server.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
    }

    if let Some(logging) = config.logging {
        if let Some(level) = logging.level {
            builder = builder.log_level(level);
        }
        if let Some(json) = logging.json {
            builder = builder.json_logs(json);
        }
    }

    if let Some(jwt) = config.jwt {
        builder = builder.jwt(jwt.into_config()?);
    }
    if let Some(rbac) = config.rbac {
        builder = builder.rbac(rbac.into_config());
    }
    if let Some(tenant) = config.tenant {
        builder = builder.tenant(tenant.into_config());
    }
    if let Some(rate_limit) = config.rate_limit {
        builder = builder.rate_limit(rate_limit.into_config()?);
    }
    if let Some(audit) = config.audit {
        builder = builder.audit(audit.into_config()?);
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server: Option<ServerFileConfig>,
    logging: Option<LoggingFileConfig>,
    jwt: Option<JwtFileConfig>,
    rbac: Option<RbacFileConfig>,
    tenant: Option<TenantFileConfig>,
    rate_limit: Option<RateLimitFileConfig>,
    audit: Option<AuditFileConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerFileConfig {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingFileConfig {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JwtFileConfig {
    algorithm: Option<String>,
    secret: Option<String>,
    public_key_file: Option<PathBuf>,
    private_key_file: Option<PathBuf>,
    jwks_uri: Option<String>,
    issuer: Option<String>,
    #[serde(default)]
    audience: Vec<String>,
    leeway_secs: Option<u64>,
    require_exp: Option<bool>,
    token_header: Option<String>,
    token_cookie: Option<String>,
    token_query_param: Option<String>,
    tenant_claim: Option<String>,
    exempt_paths: Option<Vec<String>>,
    access_token_ttl_secs: Option<u64>,
    refresh_token_ttl_secs: Option<u64>,
    jwks_cache_ttl_secs: Option<u64>,
    jwks_refresh_interval_secs: Option<u64>,
    jwks_refetch_cooldown_secs: Option<u64>,
}

impl JwtFileConfig {
    fn into_config(self) -> Result<JwtConfig> {
        let mut config = JwtConfig::default();

        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm.parse::<SigningAlgorithm>()?;
        }
        config.secret = self.secret;
        config.public_key_pem = self.public_key_file.as_deref().map(read_pem).transpose()?;
        config.private_key_pem = self.private_key_file.as_deref().map(read_pem).transpose()?;
        if let Some(uri) = self.jwks_uri {
            config.jwks_uri = Some(
                Url::parse(&uri).map_err(|e| Error::Config(format!("Invalid jwt.jwks_uri: {e}")))?,
            );
        }
        config.issuer = self.issuer;
        config.audience = self.audience;
        config.token_cookie = self.token_cookie;
        config.token_query_param = self.token_query_param;

        if let Some(secs) = self.leeway_secs {
            config.leeway = Duration::from_secs(secs);
        }
        if let Some(require_exp) = self.require_exp {
            config.require_exp = require_exp;
        }
        if let Some(header) = self.token_header {
            config.token_header = header;
        }
        if let Some(claim) = self.tenant_claim {
            config.tenant_claim = claim;
        }
        if let Some(paths) = self.exempt_paths {
            config.exempt_paths = paths;
        }
        if let Some(secs) = self.access_token_ttl_secs {
            config.access_token_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.refresh_token_ttl_secs {
            config.refresh_token_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.jwks_cache_ttl_secs {
            config.jwks_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.jwks_refresh_interval_secs {
            config.jwks_refresh_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.jwks_refetch_cooldown_secs {
            config.jwks_refetch_cooldown = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn read_pem(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read key file {}: {e}", path.display())))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RbacFileConfig {
    default_role: Option<String>,
    #[serde(default)]
    roles: BTreeMap<String, RoleFileConfig>,
    #[serde(default)]
    routes: Vec<RouteRequirement>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleFileConfig {
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    inherits: Vec<String>,
    description: Option<String>,
}

impl RbacFileConfig {
    fn into_config(self) -> RbacConfig {
        let roles = self
            .roles
            .into_iter()
            .map(|(name, role)| RoleDefinition {
                name,
                permissions: role.permissions,
                inherits: role.inherits,
                description: role.description,
            })
            .collect();

        RbacConfig {
            roles,
            default_role: self.default_role,
            routes: self.routes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TenantFileConfig {
    enabled: Option<bool>,
    header: Option<String>,
    jwt_claim: Option<String>,
    fallback_to_user_org: Option<bool>,
    org_field_name: Option<String>,
    validate_exists: Option<bool>,
    validate_active: Option<bool>,
    allow_admin_override: Option<bool>,
    admin_role: Option<String>,
    exclude_paths: Option<Vec<String>>,
}

impl TenantFileConfig {
    fn into_config(self) -> TenantConfig {
        let defaults = TenantConfig::default();
        TenantConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            header: self.header.unwrap_or(defaults.header),
            jwt_claim: self.jwt_claim.unwrap_or(defaults.jwt_claim),
            fallback_to_user_org: self
                .fallback_to_user_org
                .unwrap_or(defaults.fallback_to_user_org),
            org_field_name: self.org_field_name.unwrap_or(defaults.org_field_name),
            validate_exists: self.validate_exists.unwrap_or(defaults.validate_exists),
            validate_active: self.validate_active.unwrap_or(defaults.validate_active),
            allow_admin_override: self
                .allow_admin_override
                .unwrap_or(defaults.allow_admin_override),
            admin_role: self.admin_role.unwrap_or(defaults.admin_role),
            exclude_paths: self.exclude_paths.unwrap_or(defaults.exclude_paths),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RateLimitFileConfig {
    requests_per_minute: Option<u32>,
    burst_size: Option<u32>,
    backend: Option<String>,
    redis_url: Option<String>,
    redis_key_prefix: Option<String>,
    include_headers: Option<bool>,
    fail_open: Option<bool>,
    backend_timeout_ms: Option<u64>,
    api_key_header: Option<String>,
    trust_proxy_headers: Option<bool>,
    max_entries: Option<usize>,
    #[serde(default)]
    routes: Vec<RouteLimitFileConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteLimitFileConfig {
    pattern: String,
    requests_per_minute: Option<u32>,
    burst_size: Option<u32>,
    #[serde(default)]
    unlimited: bool,
}

impl RateLimitFileConfig {
    fn into_config(self) -> Result<RateLimitConfig> {
        let mut config = RateLimitConfig::default();

        if let Some(rpm) = self.requests_per_minute {
            config.requests_per_minute = rpm;
        }
        if let Some(burst) = self.burst_size {
            config.burst_size = burst;
        }

        config.backend = match (self.backend.as_deref(), self.redis_url) {
            (None | Some("memory"), None) => RateLimitBackend::Memory,
            (None | Some("redis"), Some(url)) => RateLimitBackend::Redis { url },
            (Some("redis"), None) => {
                return Err(Error::Config(
                    "rate_limit.redis_url required for the redis backend".into(),
                ));
            }
            (Some("memory"), Some(_)) => {
                return Err(Error::Config(
                    "rate_limit.redis_url set but backend is 'memory'".into(),
                ));
            }
            (Some(other), _) => {
                return Err(Error::Config(format!(
                    "Unknown rate_limit.backend '{other}' (expected 'memory' or 'redis')"
                )));
            }
        };

        if let Some(prefix) = self.redis_key_prefix {
            config.redis_key_prefix = prefix;
        }
        if let Some(include) = self.include_headers {
            config.include_headers = include;
        }
        if let Some(fail_open) = self.fail_open {
            config.fail_open = fail_open;
        }
        if let Some(ms) = self.backend_timeout_ms {
            config.backend_timeout = Duration::from_millis(ms);
        }
        if let Some(header) = self.api_key_header {
            config.api_key_header = header;
        }
        if let Some(trust) = self.trust_proxy_headers {
            config.trust_proxy_headers = trust;
        }
        if let Some(max) = self.max_entries {
            config.max_entries = max;
        }

        config.route_limits = self
            .routes
            .into_iter()
            .map(|route| {
                if route.unlimited {
                    RouteLimit::unlimited(route.pattern)
                } else {
                    RouteLimit::new(
                        route.pattern,
                        RouteOverride {
                            requests_per_minute: route.requests_per_minute,
                            burst_size: route.burst_size,
                        },
                    )
                }
            })
            .collect();

        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuditFileConfig {
    enabled: Option<bool>,
    backend: Option<String>,
    file_path: Option<PathBuf>,
    memory_capacity: Option<usize>,
    log_level: Option<String>,
    log_request_body: Option<bool>,
    max_body_log_size: Option<usize>,
    include_query_params: Option<bool>,
    include_request_headers: Option<bool>,
    exclude_paths: Option<Vec<String>>,
    exclude_methods: Option<Vec<String>>,
    redact_headers: Option<Vec<String>>,
    redact_fields: Option<Vec<String>>,
    trust_proxy_headers: Option<bool>,
    backend_timeout_ms: Option<u64>,
}

impl AuditFileConfig {
    fn into_config(self) -> Result<AuditConfig> {
        let mut config = AuditConfig::default();

        config.backend = match self.backend.as_deref().unwrap_or("log") {
            "log" | "logging" => AuditBackendConfig::Log,
            "file" => AuditBackendConfig::File {
                path: self.file_path.ok_or_else(|| {
                    Error::Config("audit.file_path required for the file backend".into())
                })?,
            },
            "memory" => AuditBackendConfig::Memory {
                capacity: self.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY),
            },
            other => {
                return Err(Error::Config(format!(
                    "Unknown audit.backend '{other}' (expected 'log', 'file' or 'memory')"
                )));
            }
        };

        if let Some(level) = self.log_level {
            config.log_level = level
                .parse()
                .map_err(|_| Error::Config(format!("Invalid audit.log_level '{level}'")))?;
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(log_body) = self.log_request_body {
            config.log_request_body = log_body;
        }
        if let Some(size) = self.max_body_log_size {
            config.max_body_log_size = size;
        }
        if let Some(include) = self.include_query_params {
            config.include_query_params = include;
        }
        if let Some(include) = self.include_request_headers {
            config.include_request_headers = include;
        }
        if let Some(paths) = self.exclude_paths {
            config.exclude_paths = paths;
        }
        if let Some(methods) = self.exclude_methods {
            config.exclude_methods = methods;
        }
        if let Some(headers) = self.redact_headers {
            config.redact_headers = headers;
        }
        if let Some(fields) = self.redact_fields {
            config.redact_fields = fields;
        }
        if let Some(trust) = self.trust_proxy_headers {
            config.trust_proxy_headers = trust;
        }
        if let Some(ms) = self.backend_timeout_ms {
            config.backend_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
host = "0.0.0.0"
port = 9090

[logging]
level = "debug"
json = true

[jwt]
secret = "test-secret-key-at-least-32-bytes-long"
issuer = "https://auth.local"
leeway_secs = 30
token_cookie = "access_token"
jwks_refetch_cooldown_secs = 30

[rbac]
default_role = "viewer"

[rbac.roles.viewer]
permissions = ["read:*"]

[rbac.roles.editor]
permissions = ["write:articles"]
inherits = ["viewer"]
description = "Can publish"

[[rbac.routes]]
pattern = "/admin/*"
permissions = ["admin:*"]

[tenant]
validate_exists = false
admin_role = "platform_admin"

[rate_limit]
requests_per_minute = 60
burst_size = 0
fail_open = false

[[rate_limit.routes]]
pattern = "/auth/login"
requests_per_minute = 5

[[rate_limit.routes]]
pattern = "/health"
unlimited = true

[audit]
backend = "memory"
memory_capacity = 50
log_request_body = true
"#;
        let temp_file = create_temp_config(toml_content);
        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert!(config.logging.json_logs);

        let jwt = config.pipeline.jwt.unwrap();
        assert_eq!(jwt.leeway, Duration::from_secs(30));
        assert_eq!(jwt.token_cookie.as_deref(), Some("access_token"));
        assert_eq!(jwt.jwks_refetch_cooldown, Duration::from_secs(30));

        let rbac = config.pipeline.rbac.unwrap();
        assert_eq!(rbac.default_role.as_deref(), Some("viewer"));
        let editor = rbac.roles.iter().find(|r| r.name == "editor").unwrap();
        assert_eq!(editor.inherits, ["viewer"]);
        assert_eq!(rbac.routes[0].pattern, "/admin/*");

        let tenant = config.pipeline.tenant.unwrap();
        assert!(!tenant.validate_exists);
        assert_eq!(tenant.admin_role, "platform_admin");
        assert!(tenant.validate_active);

        let rate_limit = config.pipeline.rate_limit.unwrap();
        assert!(!rate_limit.fail_open);
        assert_eq!(rate_limit.route_limits.len(), 2);
        assert!(rate_limit.route_limits[1].limit.is_none());

        let audit = config.pipeline.audit.unwrap();
        assert_eq!(audit.backend, AuditBackendConfig::Memory { capacity: 50 });
        assert!(audit.log_request_body);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let temp_file = create_temp_config(
            r#"
[jwt]
secret = "test-secret-key-at-least-32-bytes-long"
algorithim = "HS256"
"#,
        );
        let err = load_from_file(temp_file.path(), ConfigBuilder::new()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        let temp_file = create_temp_config("[database]\nurl = \"x\"\n");
        assert!(load_from_file(temp_file.path(), ConfigBuilder::new()).is_err());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(
            Path::new("/nonexistent/path/config.toml"),
            ConfigBuilder::new(),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_public_key_file() {
        let key = create_temp_config(include_str!("../../tests/fixtures/rsa_public.pem"));
        let content = format!(
            "[jwt]\nalgorithm = \"RS256\"\npublic_key_file = \"{}\"\n",
            key.path().display()
        );
        let temp_file = create_temp_config(&content);
        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();

        let jwt = config.pipeline.jwt.unwrap();
        assert_eq!(jwt.algorithm, SigningAlgorithm::RS256);
        assert!(jwt.public_key_pem.unwrap().contains("BEGIN PUBLIC KEY"));
    }

    #[test]
    fn test_backend_selection_errors() {
        let rate_limit: RateLimitFileConfig = toml::from_str("backend = \"redis\"").unwrap();
        let err = rate_limit.into_config().unwrap_err();
        assert!(err.to_string().contains("redis_url"));

        let audit: AuditFileConfig = toml::from_str("backend = \"file\"").unwrap();
        assert!(audit.into_config().is_err());

        let audit: AuditFileConfig = toml::from_str("backend = \"syslog\"").unwrap();
        assert!(audit.into_config().unwrap_err().to_string().contains("syslog"));
    }

    #[test]
    fn test_cycle_in_file_is_caught_at_resolver_build() {
        let temp_file = create_temp_config(
            r#"
[jwt]
secret = "test-secret-key-at-least-32-bytes-long"

[rbac.roles.a]
inherits = ["b"]

[rbac.roles.b]
inherits = ["a"]
"#,
        );
        let config = load_from_file(temp_file.path(), ConfigBuilder::new())
            .unwrap()
            .build()
            .unwrap();
        let err = crate::rbac::PermissionResolver::new(config.pipeline.rbac.unwrap()).unwrap_err();
        assert!(err.is_role_graph());
    }
}
