//! Axum adapter for the requirements backend.
//!
//! Every request gets its own [`PageRequirements`] (registry plus nonce) in
//! its extensions. Handlers register what the page needs; on the way out the
//! middleware injects the tags into HTML responses and attaches the security
//! headers, both using the same nonce.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};

use crate::assets::{ScriptOptions, StyleAttributes};
use crate::config::{Config, SecurityHeadersConfig};
use crate::error::RequirementsError;
use crate::http::security::{
    apply_content_security_policy, apply_security_headers, is_secure_request,
};
use crate::inject::{BaseUrlResolver, HtmlInjector, NoCombine};
use crate::nonce::NonceProvider;
use crate::registry::{AssetRegistry, ThemedScript};
use crate::theme::{DirectoryThemeLookup, ThemeLookup};

/// Largest HTML body the middleware will buffer for injection.
const MAX_HTML_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared, read-only wiring for [`requirements_middleware`].
#[derive(Clone)]
pub struct RequirementsContext {
    pub injector: HtmlInjector,
    pub theme_lookup: Arc<dyn ThemeLookup>,
    pub security_headers: SecurityHeadersConfig,
    pub enable_js_modules: bool,
}

impl RequirementsContext {
    /// Wire the default collaborators from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let requirements = &config.requirements;
        let injector = HtmlInjector::new(
            Arc::new(BaseUrlResolver::new(&requirements.asset_base_url)),
            Arc::new(NoCombine),
        )
        .with_placement(requirements.script_placement());
        let theme_lookup = DirectoryThemeLookup::new(
            &requirements.public_root,
            &requirements.themes_dir,
            requirements.themes.clone(),
        );
        Self {
            injector,
            theme_lookup: Arc::new(theme_lookup),
            security_headers: config.security_headers.clone(),
            enable_js_modules: requirements.enable_js_modules,
        }
    }
}

/// Per-request requirements handle, extracted with `Extension<PageRequirements>`.
#[derive(Clone)]
pub struct PageRequirements {
    registry: Arc<Mutex<AssetRegistry>>,
    nonce: Arc<NonceProvider>,
    theme_lookup: Arc<dyn ThemeLookup>,
}

impl PageRequirements {
    #[must_use]
    pub fn new(enable_js_modules: bool, theme_lookup: Arc<dyn ThemeLookup>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(AssetRegistry::new(enable_js_modules))),
            nonce: Arc::new(NonceProvider::new()),
            theme_lookup,
        }
    }

    /// The request's CSP nonce, for templates that write their own script tags.
    #[must_use]
    pub fn nonce(&self) -> String {
        self.nonce.get_nonce()
    }

    /// Use a nonce generated earlier in the pipeline.
    pub fn set_nonce(&self, nonce: impl Into<String>) {
        self.nonce.set_nonce(nonce);
    }

    /// Run `f` with exclusive access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut AssetRegistry) -> R) -> R {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut registry)
    }

    pub fn css(&self, file: &str, attrs: StyleAttributes) {
        self.with_registry(|r| r.register_css(file, attrs));
    }

    /// # Errors
    /// Returns `InvalidConfiguration` for an unknown cookie-consent category.
    pub fn javascript(&self, file: &str, options: ScriptOptions) -> Result<(), RequirementsError> {
        self.with_registry(|r| r.register_js(file, options))
    }

    /// # Errors
    /// Returns `ResourceNotFound` when no active theme provides `name`.
    pub fn themed_javascript(
        &self,
        name: &str,
        script: Option<ThemedScript>,
    ) -> Result<(), RequirementsError> {
        let lookup = Arc::clone(&self.theme_lookup);
        self.with_registry(|r| r.themed_javascript(lookup.as_ref(), name, script))
    }

    pub fn custom_css(&self, id: Option<&str>, css: &str) {
        self.with_registry(|r| r.register_inline_css(id, css));
    }

    pub fn custom_script(&self, id: Option<&str>, script: &str) {
        self.with_registry(|r| r.register_inline_js(id, script));
    }

    pub fn head_tag(&self, id: Option<&str>, html: &str) {
        self.with_registry(|r| r.register_head_tag(id, html));
    }
}

impl IntoResponse for RequirementsError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidConfiguration(_) | Self::WrongBackendType(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ResourceNotFound(_) => StatusCode::NOT_FOUND,
        };
        tracing::error!(error = %self, "requirements error");
        (status, self.to_string()).into_response()
    }
}

/// Middleware giving each request its own requirements and finalizing the response.
///
/// Non-HTML responses only get the security headers.
pub async fn requirements_middleware(
    Extension(ctx): Extension<Arc<RequirementsContext>>,
    mut request: Request,
    next: Next,
) -> Response {
    let secure = is_secure_request(&request, ctx.security_headers.trust_forwarded_proto);
    let requirements = PageRequirements::new(ctx.enable_js_modules, Arc::clone(&ctx.theme_lookup));
    request.extensions_mut().insert(requirements.clone());

    let response = next.run(request).await;
    let mut response = if is_html(&response) {
        finalize_html(response, &ctx.injector, &requirements).await
    } else {
        response
    };

    if ctx.security_headers.enabled {
        let headers = response.headers_mut();
        apply_security_headers(headers, &ctx.security_headers, secure);
        apply_content_security_policy(
            headers,
            &ctx.security_headers,
            &requirements.nonce(),
            secure,
        );
    }
    response
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

async fn finalize_html(
    response: Response,
    injector: &HtmlInjector,
    requirements: &PageRequirements,
) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_HTML_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "failed to buffer html response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let html = match String::from_utf8(bytes.to_vec()) {
        Ok(html) => html,
        Err(_) => {
            tracing::warn!("html response is not utf-8, skipping injection");
            return Response::from_parts(parts, Body::from(bytes));
        }
    };

    let nonce = requirements.nonce();
    let html = requirements.with_registry(|registry| injector.inject(&html, registry, &nonce));
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoThemes;

    impl ThemeLookup for NoThemes {
        fn find_themed_javascript(&self, _name: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn handles_share_registry_and_nonce() {
        let requirements = PageRequirements::new(false, Arc::new(NoThemes));
        let clone = requirements.clone();
        clone.css("a.css", StyleAttributes::default());
        assert_eq!(requirements.nonce(), clone.nonce());
        assert!(!requirements.with_registry(|r| r.is_empty()));
    }

    #[test]
    fn themed_javascript_surfaces_missing_resource() {
        let requirements = PageRequirements::new(false, Arc::new(NoThemes));
        let err = requirements.themed_javascript("menu", None).unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_consent_maps_to_server_error() {
        let requirements = PageRequirements::new(false, Arc::new(NoThemes));
        let err = requirements
            .javascript("x.js", ScriptOptions::with_cookie_consent("marketing"))
            .unwrap_err();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
