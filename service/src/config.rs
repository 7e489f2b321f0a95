use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::prelude::deserialize_vec_from_string_or_vec;

use crate::inject::ScriptPlacement;

/// Application configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. config.yaml file (if exists)
/// 3. Environment variables with DEFER_ prefix (always wins)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub requirements: RequirementsConfig,
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP server bind address.
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequirementsConfig {
    /// Emit scripts as ES modules by default (default: false).
    #[serde(default)]
    pub enable_js_modules: bool,

    /// Put scripts right before `</body>` (default: false).
    #[serde(default)]
    pub force_js_to_bottom: bool,

    /// Put scripts right after `<body>` (default: false, scripts go to the head deferred).
    #[serde(default)]
    pub write_javascript_to_body: bool,

    /// Active themes, highest priority first.
    /// Accepts either an array or comma-separated string.
    #[serde(default = "default_themes", deserialize_with = "deserialize_themes")]
    pub themes: Vec<String>,

    /// Directory holding the themes, relative to the public root.
    #[serde(default = "default_themes_dir")]
    pub themes_dir: String,

    /// Filesystem directory served as the site root.
    #[serde(default = "default_public_root")]
    pub public_root: String,

    /// URL prefix for registered files (default: "/").
    #[serde(default = "default_asset_base_url")]
    pub asset_base_url: String,
}

impl RequirementsConfig {
    #[must_use]
    pub const fn script_placement(&self) -> ScriptPlacement {
        ScriptPlacement::resolve(self.force_js_to_bottom, self.write_javascript_to_body)
    }
}

impl Default for RequirementsConfig {
    fn default() -> Self {
        Self {
            enable_js_modules: false,
            force_js_to_bottom: false,
            write_javascript_to_body: false,
            themes: default_themes(),
            themes_dir: default_themes_dir(),
            public_root: default_public_root(),
            asset_base_url: default_asset_base_url(),
        }
    }
}

/// Deserialize themes from comma-separated string or array, filtering empty values.
fn deserialize_themes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let themes: Vec<String> = deserialize_vec_from_string_or_vec(deserializer)?;
    Ok(themes
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityHeadersConfig {
    /// Add security headers to responses (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Referrer-Policy value, empty to skip (default: "no-referrer-when-downgrade").
    #[serde(default = "default_referrer_policy")]
    pub default_referrer_policy: String,

    /// Send HSTS on secure requests (default: true).
    #[serde(default = "default_true")]
    pub enable_hsts: bool,

    /// Strict-Transport-Security value, empty to skip.
    #[serde(default = "default_hsts_header")]
    pub hsts_header: String,

    /// Send a nonce-based Content-Security-Policy on secure requests (default: false).
    #[serde(default)]
    pub enable_csp: bool,

    /// CSP frame-ancestors sources, empty to omit (default: "'self'").
    #[serde(default = "default_frame_ancestors")]
    pub frame_ancestors: String,

    /// X-Frame-Options value: "DENY", "SAMEORIGIN" or empty to skip (default: "SAMEORIGIN").
    #[serde(default = "default_frame_options")]
    pub frame_options: String,

    /// Endpoint receiving CSP violation reports.
    #[serde(default)]
    pub csp_report_uri: Option<String>,

    /// Only report violations; ignored without a report endpoint (default: true).
    #[serde(default = "default_true")]
    pub csp_report_only: bool,

    /// Treat `X-Forwarded-Proto: https` as a secure connection (default: false).
    /// Enable only behind a TLS-terminating proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_proto: bool,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            default_referrer_policy: default_referrer_policy(),
            enable_hsts: default_true(),
            hsts_header: default_hsts_header(),
            enable_csp: false,
            frame_ancestors: default_frame_ancestors(),
            frame_options: default_frame_options(),
            csp_report_uri: None,
            csp_report_only: default_true(),
            trust_forwarded_proto: false,
        }
    }
}

// These functions cannot be const because serde uses function pointers for defaults
#[allow(clippy::missing_const_for_fn)]
fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_themes() -> Vec<String> {
    vec!["simple".to_string()]
}

fn default_themes_dir() -> String {
    "themes".to_string()
}

fn default_public_root() -> String {
    "public".to_string()
}

fn default_asset_base_url() -> String {
    "/".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

fn default_referrer_policy() -> String {
    "no-referrer-when-downgrade".to_string()
}

fn default_hsts_header() -> String {
    "max-age=300; includeSubDomains; preload; always;".to_string()
}

fn default_frame_ancestors() -> String {
    "'self'".to_string()
}

fn default_frame_options() -> String {
    "SAMEORIGIN".to_string()
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Sources are merged in priority order:
    /// 1. Struct defaults (lowest)
    /// 2. config.yaml file (if exists)
    /// 3. Environment variables with DEFER_ prefix (highest)
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.yaml")
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Env::prefixed("DEFER_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Port must be non-zero
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".into()));
        }

        if self.requirements.themes.is_empty() {
            return Err(ConfigError::Validation(
                "requirements.themes must name at least one theme".into(),
            ));
        }

        // X-Frame-Options must be DENY or SAMEORIGIN, or empty to skip the header
        let frame_opts = self.security_headers.frame_options.to_uppercase();
        if !frame_opts.is_empty() && frame_opts != "DENY" && frame_opts != "SAMEORIGIN" {
            return Err(ConfigError::Validation(format!(
                "security_headers.frame_options must be 'DENY', 'SAMEORIGIN' or empty, got: '{}'",
                self.security_headers.frame_options
            )));
        }

        // Report endpoints must be absolute http(s) URLs or root-relative paths; empty means unset
        let report_uri = self
            .security_headers
            .csp_report_uri
            .as_deref()
            .filter(|uri| !uri.is_empty());
        if let Some(uri) = report_uri {
            if !uri.starts_with("https://") && !uri.starts_with("http://") && !uri.starts_with('/')
            {
                return Err(ConfigError::Validation(format!(
                    "security_headers.csp_report_uri '{uri}' must start with http://, https:// or /"
                )));
            }
        }

        Ok(())
    }
}
