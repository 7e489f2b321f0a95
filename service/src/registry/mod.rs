//! Request-scoped registry of the CSS, JavaScript and head tags a page needs.
//!
//! Registration order is preserved everywhere; retrieval applies the
//! ordering rules the injector relies on (theme stylesheets last).

mod backend;

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::assets::{CookieConsent, InlineId, ScriptAttributes, ScriptOptions, StyleAttributes};
use crate::error::RequirementsError;
use crate::theme::ThemeLookup;

pub use backend::{as_defer_backend, as_defer_backend_mut, PlainBackend, RequirementsBackend};

/// Path prefix of stylesheets shipped by themes.
pub const THEMES_PREFIX: &str = "themes";

/// Path prefix of stylesheets uploaded as assets.
pub const ASSETS_PREFIX: &str = "/assets";

const MODULE_TYPE: &str = "module";
const CLASSIC_TYPE: &str = "application/javascript";
const CONSENT_TYPE: &str = "text/plain";

/// Second argument of [`AssetRegistry::themed_javascript`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemedScript {
    /// Only override the `type` attribute.
    Type(String),
    /// Full registration options.
    Options(ScriptOptions),
}

impl From<&str> for ThemedScript {
    fn from(script_type: &str) -> Self {
        Self::Type(script_type.to_string())
    }
}

impl From<ScriptOptions> for ThemedScript {
    fn from(options: ScriptOptions) -> Self {
        Self::Options(options)
    }
}

/// Deferring requirements backend.
///
/// Scripts are deferred unless they opt out, consent-gated scripts are
/// neutralised with `type="text/plain"`, and theme stylesheets are always
/// emitted after the others.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    enable_js_modules: bool,
    css: IndexMap<String, StyleAttributes>,
    javascript: IndexMap<String, ScriptAttributes>,
    custom_css: IndexMap<InlineId, String>,
    custom_script: IndexMap<InlineId, String>,
    head_tags: IndexMap<InlineId, String>,
    blocked: HashSet<String>,
}

impl AssetRegistry {
    #[must_use]
    pub fn new(enable_js_modules: bool) -> Self {
        Self {
            enable_js_modules,
            ..Self::default()
        }
    }

    /// Whether scripts default to ES modules.
    #[must_use]
    pub const fn enable_js_modules(&self) -> bool {
        self.enable_js_modules
    }

    /// Copy every requirement of `old` into a new deferring registry.
    ///
    /// Backends without a "not set" state store `defer=false` for files that
    /// never asked for it; that value is dropped so the files get deferred.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if `old` holds a script the deferring
    /// backend refuses.
    pub fn migrate_from(
        old: &dyn RequirementsBackend,
        enable_js_modules: bool,
    ) -> Result<Self, RequirementsError> {
        let mut registry = Self::new(enable_js_modules);
        for (file, attrs) in old.css_files() {
            registry.register_css(file, attrs);
        }
        for (file, attrs) in old.javascript_files() {
            let mut options = ScriptOptions::from(&attrs);
            options.defer = None;
            registry.register_js(file, options)?;
        }
        for (id, css) in old.custom_css() {
            registry.custom_css.insert(id, css);
        }
        for (id, script) in old.custom_scripts() {
            registry.custom_script.insert(id, script);
        }
        for (id, tag) in old.head_tags() {
            registry.head_tags.insert(id, tag);
        }
        tracing::debug!(from = old.backend_name(), "migrated requirements backend");
        Ok(registry)
    }

    /// Register a stylesheet. A second registration of `file` replaces its attributes.
    pub fn register_css(&mut self, file: impl Into<String>, attrs: StyleAttributes) {
        let file = file.into();
        tracing::debug!(file = %file, "register css");
        self.css.insert(file, attrs);
    }

    /// Register a script file.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` when `cookie_consent` names an unknown
    /// category. Nothing is stored in that case.
    pub fn register_js(
        &mut self,
        file: impl Into<String>,
        options: ScriptOptions,
    ) -> Result<(), RequirementsError> {
        let file = file.into();
        let cookie_consent = options
            .cookie_consent
            .as_deref()
            .map(str::parse::<CookieConsent>)
            .transpose()?;

        let mut script_type = options.script_type;
        let mut defer = options.defer;
        if self.enable_js_modules {
            if script_type.is_none() {
                script_type = Some(MODULE_TYPE.to_string());
            }
            // modules are deferred already
            if script_type.as_deref() == Some(MODULE_TYPE) {
                defer = None;
            }
        } else if defer.is_none() {
            defer = Some(true);
        }
        if cookie_consent.is_some() {
            script_type = Some(CONSENT_TYPE.to_string());
        }
        if options.nomodule {
            script_type = Some(CLASSIC_TYPE.to_string());
        }

        let attrs = ScriptAttributes {
            async_load: options.async_load,
            defer,
            script_type,
            integrity: options.integrity,
            crossorigin: options.crossorigin,
            cookie_consent,
            nomodule: options.nomodule,
        };
        tracing::debug!(file = %file, ?attrs, "register js");
        match self.javascript.get_mut(&file) {
            Some(existing) => existing.merge(attrs),
            None => {
                self.javascript.insert(file, attrs);
            }
        }
        Ok(())
    }

    /// Resolve `name` through the active themes and register the result.
    ///
    /// # Errors
    /// Returns `ResourceNotFound` when no theme provides the script, or
    /// `InvalidConfiguration` from [`Self::register_js`].
    pub fn themed_javascript(
        &mut self,
        lookup: &dyn ThemeLookup,
        name: &str,
        script: Option<ThemedScript>,
    ) -> Result<(), RequirementsError> {
        let path = lookup.find_themed_javascript(name).ok_or_else(|| {
            RequirementsError::ResourceNotFound(format!(
                "the javascript file {name}.js does not exist in any active theme"
            ))
        })?;
        let options = match script {
            None => ScriptOptions::default(),
            // an empty type means "no override"
            Some(ThemedScript::Type(script_type)) if script_type.is_empty() => {
                ScriptOptions::default()
            }
            Some(ThemedScript::Type(script_type)) => ScriptOptions::with_type(script_type),
            Some(ThemedScript::Options(options)) => options,
        };
        self.register_js(path, options)
    }

    /// Register inline CSS. Without an id the entry gets the next free index.
    pub fn register_inline_css(&mut self, id: Option<&str>, css: impl Into<String>) {
        let id = inline_id(&self.custom_css, id);
        self.custom_css.insert(id, css.into());
    }

    /// Register an inline script. Without an id the entry gets the next free index.
    ///
    /// The id doubles as a flag channel: `jsmodule` anywhere in it marks a
    /// module, a trailing `-<cookie category>` marks a consent-gated script.
    pub fn register_inline_js(&mut self, id: Option<&str>, script: impl Into<String>) {
        let id = inline_id(&self.custom_script, id);
        self.custom_script.insert(id, script.into());
    }

    /// Register raw markup emitted first in `<head>`.
    pub fn register_head_tag(&mut self, id: Option<&str>, html: impl Into<String>) {
        let id = inline_id(&self.head_tags, id);
        self.head_tags.insert(id, html.into());
    }

    /// Exclude a file or named inline entry from retrieval.
    pub fn block(&mut self, id: impl Into<String>) {
        self.blocked.insert(id.into());
    }

    pub fn unblock(&mut self, id: &str) {
        self.blocked.remove(id);
    }

    /// Stylesheets, with theme and asset files moved after the others.
    #[must_use]
    pub fn css(&self) -> Vec<(&str, &StyleAttributes)> {
        let (normal, themed): (Vec<_>, Vec<_>) = self
            .css
            .iter()
            .filter(|(file, _)| !self.blocked.contains(*file))
            .map(|(file, attrs)| (file.as_str(), attrs))
            .partition(|(file, _)| !is_theme_file(file));
        normal.into_iter().chain(themed).collect()
    }

    pub fn javascript(&self) -> impl Iterator<Item = (&str, &ScriptAttributes)> {
        self.javascript
            .iter()
            .filter(|(file, _)| !self.blocked.contains(*file))
            .map(|(file, attrs)| (file.as_str(), attrs))
    }

    pub fn inline_css(&self) -> impl Iterator<Item = (&InlineId, &str)> {
        self.unblocked(&self.custom_css)
    }

    pub fn inline_js(&self) -> impl Iterator<Item = (&InlineId, &str)> {
        self.unblocked(&self.custom_script)
    }

    pub fn head_tags(&self) -> impl Iterator<Item = (&InlineId, &str)> {
        self.unblocked(&self.head_tags)
    }

    /// Mutable file maps, for collaborators that bundle files.
    pub fn css_files_mut(&mut self) -> &mut IndexMap<String, StyleAttributes> {
        &mut self.css
    }

    pub fn javascript_files_mut(&mut self) -> &mut IndexMap<String, ScriptAttributes> {
        &mut self.javascript
    }

    /// True when nothing at all was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.css.is_empty()
            && self.javascript.is_empty()
            && self.custom_css.is_empty()
            && self.custom_script.is_empty()
            && self.head_tags.is_empty()
    }

    /// Forget every registration. Blocks are kept, like the module-mode flag.
    pub fn clear_all(&mut self) {
        self.css.clear();
        self.javascript.clear();
        self.custom_css.clear();
        self.custom_script.clear();
        self.head_tags.clear();
    }

    fn unblocked<'a>(
        &'a self,
        map: &'a IndexMap<InlineId, String>,
    ) -> impl Iterator<Item = (&'a InlineId, &'a str)> {
        map.iter()
            .filter(|(id, _)| !id.name().is_some_and(|name| self.blocked.contains(name)))
            .map(|(id, value)| (id, value.as_str()))
    }
}

fn is_theme_file(file: &str) -> bool {
    file.starts_with(THEMES_PREFIX) || file.starts_with(ASSETS_PREFIX)
}

fn inline_id(map: &IndexMap<InlineId, String>, id: Option<&str>) -> InlineId {
    match id {
        Some(name) => InlineId::Named(name.to_string()),
        None => InlineId::Auto(
            map.keys()
                .filter_map(|key| match key {
                    InlineId::Auto(index) => Some(index + 1),
                    InlineId::Named(_) => None,
                })
                .max()
                .unwrap_or(0),
        ),
    }
}
