use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use authgate::auth::{JwksRefreshTask, TokenSigner};
use authgate::config;
use authgate::middleware::auth_pipeline_middleware;
use authgate::observability::init_observability;
use authgate::pipeline::{AuthPipelineBuilder, Rejection};
use authgate::tenant::{InMemoryTenantStore, TenantInfo, TenantResolver};
use authgate::RequestContext;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use http::StatusCode;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

#[derive(Parser, Debug)]
#[command(name = "authgate")]
#[command(about = "Demo HTTP service behind the authgate auth pipeline", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP bind host
    #[arg(long)]
    http_host: Option<IpAddr>,

    /// HTTP bind port
    #[arg(long)]
    http_port: Option<u16>,

    /// Register a tenant in the in-memory tenant store (repeatable)
    #[arg(long = "tenant")]
    tenants: Vec<String>,

    /// Print an access token for SUBJECT and exit (requires a signing key)
    #[arg(long, value_name = "SUBJECT")]
    issue_token: Option<String>,

    /// Roles for --issue-token (comma-separated)
    #[arg(long, value_delimiter = ',')]
    roles: Vec<String>,

    /// Tenant claim for --issue-token
    #[arg(long)]
    token_tenant: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Precedence: env > file > defaults, then CLI flags
    let mut builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path)?
    } else {
        config::load_config()?
    };

    if let Some(host) = args.http_host {
        builder = builder.http_host(host);
    }
    if let Some(port) = args.http_port {
        builder = builder.http_port(port);
    }
    if args.verbose {
        builder = builder.log_level("debug");
    }
    if args.json_logs {
        builder = builder.json_logs(true);
    }

    let config = builder.build()?;

    if let Some(subject) = args.issue_token.as_deref() {
        let jwt = config
            .pipeline
            .jwt
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("--issue-token requires [jwt] configuration"))?;
        let mut claims = Map::new();
        claims.insert("roles".into(), json!(args.roles));
        if let Some(tenant) = &args.token_tenant {
            claims.insert(jwt.tenant_claim.clone(), json!(tenant));
        }
        println!("{}", TokenSigner::new(jwt)?.issue_access_token(subject, claims)?);
        return Ok(());
    }

    init_observability(&config.logging)?;

    let tenant_config = config.pipeline.tenant.clone();
    let mut pipeline_builder = AuthPipelineBuilder::from_config(config.pipeline).await?;
    if let Some(tenant_config) = tenant_config {
        let store = Arc::new(InMemoryTenantStore::new());
        for tenant in &args.tenants {
            store.register(TenantInfo::new(tenant));
        }
        pipeline_builder =
            pipeline_builder.tenant(TenantResolver::new(tenant_config).with_store(store));
    }
    let pipeline = pipeline_builder.build()?;

    tracing::info!("Starting {}", pipeline.describe());

    let shutdown_token = CancellationToken::new();
    let refresh_task = pipeline
        .verifier()
        .and_then(|verifier| verifier.jwks_cache().map(|cache| (verifier, cache)))
        .map(|(verifier, cache)| {
            JwksRefreshTask::new(Arc::clone(cache), verifier.config().jwks_refresh_interval)
                .spawn(shutdown_token.clone())
        });

    let app = Router::new()
        .route("/health", get(health))
        .route("/me", get(me))
        .route("/articles", get(list_articles).post(create_article))
        .route("/metrics", get(metrics))
        .layer(axum::middleware::from_fn_with_state(
            pipeline.clone(),
            auth_pipeline_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.server.request_timeout,
        ));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {addr}: {e}"))?;
    tracing::info!("HTTP server listening on {addr}");

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    let serve_token = shutdown_token.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { serve_token.cancelled().await })
    .await?;

    shutdown_token.cancel();
    if let Some(task) = refresh_task {
        task.await.ok();
    }
    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn me(context: RequestContext) -> Json<Value> {
    Json(json!({
        "request_id": context.request_id(),
        "user_id": context.user_id(),
        "email": context.identity().and_then(|i| i.email.clone()),
        "roles": context.identity().map(|i| i.roles.clone()),
        "tenant_id": context.tenant_id(),
        "permissions": context.permissions(),
    }))
}

async fn list_articles(context: RequestContext) -> Result<Json<Value>, Rejection> {
    context.require_permission("read:articles")?;
    Ok(Json(json!({
        "tenant_id": authgate::tenant::current_tenant().map(|t| t.tenant_id.clone()),
        "articles": [],
    })))
}

async fn create_article(
    context: RequestContext,
    Json(article): Json<Value>,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    context.require_permission("write:articles")?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "author": context.user_id(), "article": article })),
    ))
}

#[cfg(feature = "metrics")]
async fn metrics() -> String {
    authgate::observability::render_metrics()
}

#[cfg(not(feature = "metrics"))]
async fn metrics() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "metrics feature disabled")
}
