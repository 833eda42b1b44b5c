//! Hot-path benchmarks for the auth pipeline stages
//!
//! Covers permission resolution over role hierarchies, wildcard checks,
//! route pattern matching, and in-memory token bucket admission.

use std::hint::black_box;
use std::sync::Arc;

use authgate::auth::Identity;
use authgate::pattern::glob_match;
use authgate::rate_limit::{MemoryRateLimitStore, RateLimitConfig, RateLimiter};
use authgate::rbac::{PermissionResolver, RbacConfig, RoleDefinition};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Map, json};
use tokio::runtime::Runtime;

fn identity(roles: &[&str]) -> Identity {
    let mut claims = Map::new();
    claims.insert("sub".into(), json!("bench-user"));
    claims.insert("roles".into(), json!(roles));
    Identity::from_claims(claims, "tenant_id").unwrap()
}

/// A linear chain `role_0 <- role_1 <- ... <- role_{depth-1}`
fn chained_roles(depth: usize) -> RbacConfig {
    let roles = (0..depth)
        .map(|i| {
            let role = RoleDefinition::new(format!("role_{i}"))
                .with_permissions([format!("read:resource_{i}"), format!("write:resource_{i}")]);
            if i == 0 {
                role
            } else {
                role.inherits([format!("role_{}", i - 1)])
            }
        })
        .collect();
    RbacConfig::new(roles)
}

fn bench_permission_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_resolution");

    for depth in [1, 4, 16] {
        let resolver = PermissionResolver::new(chained_roles(depth)).unwrap();
        let user = identity(&[&format!("role_{}", depth - 1)]);

        group.bench_with_input(BenchmarkId::new("resolve", depth), &depth, |b, _| {
            b.iter(|| black_box(resolver.resolve(black_box(&user))));
        });
    }

    group.finish();
}

fn bench_permission_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_check");

    let resolver = PermissionResolver::new(RbacConfig::new(vec![
        RoleDefinition::new("admin").with_permissions(["*:*"]),
        RoleDefinition::new("editor").with_permissions(["read:*", "write:articles"]),
    ]))
    .unwrap();

    let admin = resolver.resolve(&identity(&["admin"]));
    let editor = resolver.resolve(&identity(&["editor"]));

    group.bench_function("wildcard_all", |b| {
        b.iter(|| black_box(admin.allows(black_box("delete:articles"))));
    });
    group.bench_function("action_wildcard", |b| {
        b.iter(|| black_box(editor.allows(black_box("read:comments"))));
    });
    group.bench_function("denied", |b| {
        b.iter(|| black_box(editor.allows(black_box("delete:articles"))));
    });

    group.finish();
}

fn bench_glob_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("glob_match");

    let cases = [
        ("exact", "/health", "/health"),
        ("prefix", "/api/*", "/api/v1/articles/42"),
        ("infix", "/api/*/admin/*", "/api/v1/admin/users"),
        ("miss", "/public/*", "/api/v1/articles"),
    ];

    for (name, pattern, path) in cases {
        group.bench_function(name, |b| {
            b.iter(|| black_box(glob_match(black_box(pattern), black_box(path))));
        });
    }

    group.finish();
}

fn bench_memory_admission(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("memory_admission");

    let limiter = RateLimiter::with_store(
        RateLimitConfig::new(1_000_000_000, 0),
        Arc::new(MemoryRateLimitStore::default()),
    )
    .unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("single_identifier", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(limiter.admit("user:bench", "/api/articles").await.unwrap());
        });
    });

    for identifiers in [10_usize, 1_000] {
        let keys: Vec<String> = (0..identifiers)
            .map(|i| format!("ip:10.0.{}.{}", i / 256, i % 256))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("spread_identifiers", identifiers),
            &keys,
            |b, keys| {
                let mut next = 0;
                b.to_async(&rt).iter(|| {
                    let key = &keys[next % keys.len()];
                    next += 1;
                    let limiter = &limiter;
                    async move {
                        black_box(limiter.admit(key, "/api/articles").await.unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_permission_resolution,
    bench_permission_check,
    bench_glob_match,
    bench_memory_admission,
);
criterion_main!(benches);
