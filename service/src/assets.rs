//! Asset data model shared by the registry and the injector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RequirementsError;

/// Cookie categories a consent-gated script can belong to.
///
/// Scripts tagged with a category are emitted with `type="text/plain"` so the
/// browser does not run them until a consent manager rewrites the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CookieConsent {
    StrictlyNecessary,
    Functionality,
    Tracking,
    Targeting,
}

impl CookieConsent {
    /// Every category, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::StrictlyNecessary,
        Self::Functionality,
        Self::Tracking,
        Self::Targeting,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrictlyNecessary => "strictly-necessary",
            Self::Functionality => "functionality",
            Self::Tracking => "tracking",
            Self::Targeting => "targeting",
        }
    }

    /// Match an exact category name, without producing an error.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for CookieConsent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CookieConsent {
    type Err = RequirementsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            RequirementsError::InvalidConfiguration(format!(
                "the cookie-consent value '{s}' is invalid, it must be one of: {}",
                list_cookie_types().join(",")
            ))
        })
    }
}

/// Names of the supported cookie categories.
#[must_use]
pub fn list_cookie_types() -> [&'static str; 4] {
    CookieConsent::ALL.map(CookieConsent::as_str)
}

/// Options a caller passes when registering a script file.
///
/// `cookie_consent` is kept as raw text so that registration can reject
/// unknown categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOptions {
    pub async_load: bool,
    /// `None` lets the backend apply its default (deferred).
    pub defer: Option<bool>,
    pub script_type: Option<String>,
    pub integrity: Option<String>,
    pub crossorigin: Option<String>,
    pub cookie_consent: Option<String>,
    pub nomodule: bool,
}

impl ScriptOptions {
    #[must_use]
    pub fn with_type(script_type: impl Into<String>) -> Self {
        Self {
            script_type: Some(script_type.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cookie_consent(category: impl Into<String>) -> Self {
        Self {
            cookie_consent: Some(category.into()),
            ..Self::default()
        }
    }
}

/// Attributes stored for a registered script file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptAttributes {
    pub async_load: bool,
    pub defer: Option<bool>,
    pub script_type: Option<String>,
    pub integrity: Option<String>,
    pub crossorigin: Option<String>,
    pub cookie_consent: Option<CookieConsent>,
    pub nomodule: bool,
}

impl ScriptAttributes {
    /// Fold a later registration of the same file into these attributes.
    ///
    /// `async`/`defer` stay on once any registration asked for them; the
    /// remaining values are replaced when the newer registration sets them.
    pub fn merge(&mut self, newer: Self) {
        self.async_load |= newer.async_load;
        self.defer = match (self.defer, newer.defer) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (_, Some(false)) | (Some(false), None) => Some(false),
            (None, None) => None,
        };
        if newer.script_type.is_some() {
            self.script_type = newer.script_type;
        }
        if newer.integrity.is_some() {
            self.integrity = newer.integrity;
        }
        if newer.crossorigin.is_some() {
            self.crossorigin = newer.crossorigin;
        }
        if newer.cookie_consent.is_some() {
            self.cookie_consent = newer.cookie_consent;
        }
        self.nomodule |= newer.nomodule;
    }
}

impl From<&ScriptAttributes> for ScriptOptions {
    fn from(attrs: &ScriptAttributes) -> Self {
        Self {
            async_load: attrs.async_load,
            defer: attrs.defer,
            script_type: attrs.script_type.clone(),
            integrity: attrs.integrity.clone(),
            crossorigin: attrs.crossorigin.clone(),
            cookie_consent: attrs.cookie_consent.map(|c| c.as_str().to_string()),
            nomodule: attrs.nomodule,
        }
    }
}

/// Attributes stored for a registered stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleAttributes {
    pub media: Option<String>,
}

impl StyleAttributes {
    #[must_use]
    pub fn media(media: impl Into<String>) -> Self {
        Self {
            media: Some(media.into()),
        }
    }
}

/// Key of an inline entry (custom CSS, custom script, head tag).
///
/// Entries registered without a name get the next free sequential index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InlineId {
    Auto(usize),
    Named(String),
}

impl InlineId {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Auto(_) => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for InlineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto(index) => write!(f, "{index}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}
