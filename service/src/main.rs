#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use defer_backend::{
    config::Config,
    http::{pages::home_page, requirements_middleware, RequirementsContext},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

// Health check handler
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load and validate configuration first (fail-fast)
    let config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up logging from config
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.level))
        .init();

    // Init banner so container logs clearly show startup
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "defer-backend starting up"
    );

    let ctx = RequirementsContext::from_config(&config);
    tracing::info!(
        placement = ?ctx.injector.placement(),
        js_modules = ctx.enable_js_modules,
        themes = ?config.requirements.themes,
        "requirements backend configured"
    );
    if config.security_headers.enabled {
        tracing::info!(
            csp = config.security_headers.enable_csp,
            hsts = config.security_headers.enable_hsts,
            "Security headers enabled"
        );
    } else {
        tracing::info!("Security headers disabled");
    }

    // Build the app
    let app = Router::new()
        .route("/", get(home_page))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(requirements_middleware))
        .layer(Extension(Arc::new(ctx)))
        .layer(TraceLayer::new_for_http());

    // Start the server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Starting server at http://{}/", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
