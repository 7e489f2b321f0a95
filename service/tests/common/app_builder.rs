//! Test app builder that mirrors main.rs wiring with injectable config and pages.
//!
//! # Preset Builders
//!
//! - [`TestAppBuilder::minimal()`] - Health check only
//! - [`TestAppBuilder::with_home()`] - Demo home page plus health check

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    handler::Handler,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use defer_backend::{
    config::{Config, RequirementsConfig, SecurityHeadersConfig},
    http::{pages::home_page, requirements_middleware, RequirementsContext},
    inject::ScriptPlacement,
};

/// Health check handler (mirrors main.rs)
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Builder for test applications that mirrors main.rs wiring.
pub struct TestAppBuilder {
    config: Config,
    router: Router,
    placement: Option<ScriptPlacement>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    /// Create a new empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            router: Router::new(),
            placement: None,
        }
    }

    // =========================================================================
    // Preset Builders
    // =========================================================================

    /// Create a minimal app with only the health check endpoint.
    #[must_use]
    pub fn minimal() -> Self {
        Self::new().with_health()
    }

    /// Create an app serving the demo home page.
    #[must_use]
    pub fn with_home() -> Self {
        Self::new().with_health().with_page("/", home_page)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    #[must_use]
    pub fn with_health(mut self) -> Self {
        self.router = self.router.route("/health", get(health_check));
        self
    }

    /// Mount `handler` under `path` for GET requests.
    #[must_use]
    pub fn with_page<H, T>(mut self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.router = self.router.route(path, get(handler));
        self
    }

    #[must_use]
    pub fn with_security_headers(mut self, config: SecurityHeadersConfig) -> Self {
        self.config.security_headers = config;
        self
    }

    /// Enable CSP and trust `X-Forwarded-Proto` so tests can fake TLS.
    #[must_use]
    pub fn with_csp(mut self) -> Self {
        self.config.security_headers.enable_csp = true;
        self.config.security_headers.trust_forwarded_proto = true;
        self
    }

    #[must_use]
    pub fn with_requirements(mut self, config: RequirementsConfig) -> Self {
        self.config.requirements = config;
        self
    }

    #[must_use]
    pub fn with_placement(mut self, placement: ScriptPlacement) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Build the router with the same layer ordering as main.rs.
    pub fn build(self) -> Router {
        let mut ctx = RequirementsContext::from_config(&self.config);
        if let Some(placement) = self.placement {
            ctx.injector = ctx.injector.with_placement(placement);
        }
        self.router
            .layer(middleware::from_fn(requirements_middleware))
            .layer(Extension(Arc::new(ctx)))
    }
}
