//! Capability interface shared by requirements backends.

use std::any::Any;

use indexmap::IndexMap;

use super::AssetRegistry;
use crate::assets::{InlineId, ScriptAttributes, ScriptOptions, StyleAttributes};
use crate::error::RequirementsError;

/// Read access to whatever a backend has collected, plus a downcast hook.
///
/// Hosts that keep the installed backend behind `dyn RequirementsBackend`
/// use [`as_defer_backend`] to get the deferring implementation back.
pub trait RequirementsBackend: Any + Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn css_files(&self) -> Vec<(String, StyleAttributes)>;

    fn javascript_files(&self) -> Vec<(String, ScriptAttributes)>;

    fn custom_css(&self) -> Vec<(InlineId, String)>;

    fn custom_scripts(&self) -> Vec<(InlineId, String)>;

    fn head_tags(&self) -> Vec<(InlineId, String)>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Borrow `backend` as the deferring registry.
///
/// # Errors
/// Returns `WrongBackendType` naming the installed backend otherwise.
pub fn as_defer_backend(
    backend: &dyn RequirementsBackend,
) -> Result<&AssetRegistry, RequirementsError> {
    let name = backend.backend_name();
    backend
        .as_any()
        .downcast_ref::<AssetRegistry>()
        .ok_or_else(|| RequirementsError::WrongBackendType(name.to_string()))
}

/// Mutable counterpart of [`as_defer_backend`].
///
/// # Errors
/// Returns `WrongBackendType` naming the installed backend otherwise.
pub fn as_defer_backend_mut(
    backend: &mut dyn RequirementsBackend,
) -> Result<&mut AssetRegistry, RequirementsError> {
    let name = backend.backend_name();
    backend
        .as_any_mut()
        .downcast_mut::<AssetRegistry>()
        .ok_or_else(|| RequirementsError::WrongBackendType(name.to_string()))
}

impl RequirementsBackend for AssetRegistry {
    fn backend_name(&self) -> &'static str {
        "AssetRegistry"
    }

    fn css_files(&self) -> Vec<(String, StyleAttributes)> {
        self.css()
            .into_iter()
            .map(|(file, attrs)| (file.to_string(), attrs.clone()))
            .collect()
    }

    fn javascript_files(&self) -> Vec<(String, ScriptAttributes)> {
        self.javascript()
            .map(|(file, attrs)| (file.to_string(), attrs.clone()))
            .collect()
    }

    fn custom_css(&self) -> Vec<(InlineId, String)> {
        owned(self.inline_css())
    }

    fn custom_scripts(&self) -> Vec<(InlineId, String)> {
        owned(self.inline_js())
    }

    fn head_tags(&self) -> Vec<(InlineId, String)> {
        owned(AssetRegistry::head_tags(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn owned<'a>(entries: impl Iterator<Item = (&'a InlineId, &'a str)>) -> Vec<(InlineId, String)> {
    entries
        .map(|(id, value)| (id.clone(), value.to_string()))
        .collect()
}

/// Backend that stores requirements as given, without deferral defaults.
///
/// A script registered without `defer` is stored with `defer=false`, since
/// this backend has no "not set" state. [`AssetRegistry::migrate_from`]
/// undoes that when switching to the deferring backend.
#[derive(Debug, Clone, Default)]
pub struct PlainBackend {
    css: IndexMap<String, StyleAttributes>,
    javascript: IndexMap<String, ScriptAttributes>,
    custom_css: Vec<(InlineId, String)>,
    custom_scripts: Vec<(InlineId, String)>,
}

impl PlainBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn css(&mut self, file: impl Into<String>, attrs: StyleAttributes) {
        self.css.insert(file.into(), attrs);
    }

    /// Store `options` with `defer` and `async` flattened to plain booleans.
    ///
    /// Consent categories are not validated here; unknown ones are dropped.
    pub fn javascript(&mut self, file: impl Into<String>, options: ScriptOptions) {
        let attrs = ScriptAttributes {
            async_load: options.async_load,
            defer: Some(options.defer.unwrap_or(false)),
            script_type: options.script_type,
            integrity: options.integrity,
            crossorigin: options.crossorigin,
            cookie_consent: options
                .cookie_consent
                .as_deref()
                .and_then(crate::assets::CookieConsent::from_name),
            nomodule: options.nomodule,
        };
        self.javascript.insert(file.into(), attrs);
    }

    pub fn register_inline_css(&mut self, id: Option<&str>, css: impl Into<String>) {
        let id = next_id(&self.custom_css, id);
        self.custom_css.push((id, css.into()));
    }

    pub fn register_inline_js(&mut self, id: Option<&str>, script: impl Into<String>) {
        let id = next_id(&self.custom_scripts, id);
        self.custom_scripts.push((id, script.into()));
    }
}

fn next_id(entries: &[(InlineId, String)], id: Option<&str>) -> InlineId {
    id.map_or(InlineId::Auto(entries.len()), |name| {
        InlineId::Named(name.to_string())
    })
}

impl RequirementsBackend for PlainBackend {
    fn backend_name(&self) -> &'static str {
        "PlainBackend"
    }

    fn css_files(&self) -> Vec<(String, StyleAttributes)> {
        self.css
            .iter()
            .map(|(file, attrs)| (file.clone(), attrs.clone()))
            .collect()
    }

    fn javascript_files(&self) -> Vec<(String, ScriptAttributes)> {
        self.javascript
            .iter()
            .map(|(file, attrs)| (file.clone(), attrs.clone()))
            .collect()
    }

    fn custom_css(&self) -> Vec<(InlineId, String)> {
        self.custom_css.clone()
    }

    fn custom_scripts(&self) -> Vec<(InlineId, String)> {
        self.custom_scripts.clone()
    }

    fn head_tags(&self) -> Vec<(InlineId, String)> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
