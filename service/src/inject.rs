//! Splices registered requirements into a rendered HTML document.
//!
//! This is targeted string injection, not HTML parsing: the document only
//! needs a `</head>` anchor, plus `<body>`/`</body>` for body placements.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::assets::{CookieConsent, InlineId};
use crate::html::create_tag;
use crate::registry::AssetRegistry;

const MODULE_TYPE: &str = "module";
const CLASSIC_TYPE: &str = "application/javascript";
const CONSENT_TYPE: &str = "text/plain";

/// Inline script ids containing this are emitted as modules.
pub const JS_MODULE_MARKER: &str = "jsmodule";

/// Scripts containing this already wait for the DOM and are not wrapped again.
const DOM_READY_MARKER: &str = "window.addEventListener";

#[allow(clippy::expect_used)]
static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\b").expect("static pattern"));

#[allow(clippy::expect_used)]
static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body\b[^>]*>").expect("static pattern"));

#[allow(clippy::expect_used)]
static BODY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\b").expect("static pattern"));

#[allow(clippy::expect_used)]
static COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\*(?:[^*]|\*+[^*/])*\*+/|//.*").expect("static pattern")
});

/// Where the script fragment goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptPlacement {
    /// Before `</head>`, after the CSS.
    #[default]
    Head,
    /// Right after the opening `<body>` tag.
    BodyStart,
    /// Right before the last `</body>`.
    BodyEnd,
}

impl ScriptPlacement {
    /// Forcing scripts to the bottom wins over writing them to the body.
    #[must_use]
    pub const fn resolve(force_js_to_bottom: bool, write_javascript_to_body: bool) -> Self {
        if force_js_to_bottom {
            Self::BodyEnd
        } else if write_javascript_to_body {
            Self::BodyStart
        } else {
            Self::Head
        }
    }
}

/// Maps a registered file to the URL the browser should fetch.
pub trait AssetResolver: Send + Sync {
    fn path_for_file(&self, file: &str) -> String;
}

/// Prefixes relative files with a base URL; absolute URLs pass through.
#[derive(Debug, Clone)]
pub struct BaseUrlResolver {
    base_url: String,
}

impl BaseUrlResolver {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for BaseUrlResolver {
    fn default() -> Self {
        Self::new("/")
    }
}

impl AssetResolver for BaseUrlResolver {
    fn path_for_file(&self, file: &str) -> String {
        if file.contains("://") || file.starts_with("//") {
            return file.to_string();
        }
        format!("{}/{}", self.base_url, file.trim_start_matches('/'))
    }
}

/// Bundling hook. May rewrite the registry's file maps before tags are built.
pub trait FileCombiner: Send + Sync {
    fn process_combined_files(&self, registry: &mut AssetRegistry);
}

/// Combiner that leaves every file as registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCombine;

impl FileCombiner for NoCombine {
    fn process_combined_files(&self, _registry: &mut AssetRegistry) {}
}

/// Builds the requirement tags and splices them into documents.
#[derive(Clone)]
pub struct HtmlInjector {
    resolver: Arc<dyn AssetResolver>,
    combiner: Arc<dyn FileCombiner>,
    placement: ScriptPlacement,
}

impl Default for HtmlInjector {
    fn default() -> Self {
        Self::new(Arc::new(BaseUrlResolver::default()), Arc::new(NoCombine))
    }
}

impl HtmlInjector {
    #[must_use]
    pub fn new(resolver: Arc<dyn AssetResolver>, combiner: Arc<dyn FileCombiner>) -> Self {
        Self {
            resolver,
            combiner,
            placement: ScriptPlacement::default(),
        }
    }

    #[must_use]
    pub const fn with_placement(mut self, placement: ScriptPlacement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub const fn placement(&self) -> ScriptPlacement {
        self.placement
    }

    /// Return `content` with the registered requirements injected.
    ///
    /// Documents without `</head>` and empty registries come back unchanged.
    /// Nothing is consumed: the same registry and nonce give the same output.
    pub fn inject(&self, content: &str, registry: &mut AssetRegistry, nonce: &str) -> String {
        let Some(head_close) = HEAD_CLOSE.find(content) else {
            tracing::debug!("no </head> anchor, document left untouched");
            return content.to_string();
        };
        if registry.is_empty() {
            return content.to_string();
        }

        self.combiner.process_combined_files(registry);

        let head = self.head_fragment(registry);
        let scripts = self.script_fragment(registry, nonce);

        let scripts_at = match self.placement {
            ScriptPlacement::Head => None,
            ScriptPlacement::BodyStart => BODY_OPEN.find(content).map(|m| m.end()),
            ScriptPlacement::BodyEnd => BODY_CLOSE.find_iter(content).last().map(|m| m.start()),
        };
        let scripts_at = scripts_at.unwrap_or_else(|| {
            if self.placement != ScriptPlacement::Head {
                tracing::debug!(placement = ?self.placement, "no body anchor, scripts go to head");
            }
            head_close.start()
        });

        // the stable sort keeps the head fragment ahead of scripts at the same offset
        let mut inserts = [(head_close.start(), head.as_str()), (scripts_at, scripts.as_str())];
        inserts.sort_by_key(|(at, _)| *at);

        let mut out = String::with_capacity(content.len() + head.len() + scripts.len());
        let mut last = 0;
        for (at, fragment) in inserts {
            out.push_str(&content[last..at]);
            out.push_str(fragment);
            last = at;
        }
        out.push_str(&content[last..]);
        out
    }

    /// Head tags, then stylesheet links, then inline styles.
    fn head_fragment(&self, registry: &AssetRegistry) -> String {
        let mut out = String::new();
        for (_, tag) in registry.head_tags() {
            out.push_str(tag);
            out.push('\n');
        }
        for (file, attrs) in registry.css() {
            let href = self.resolver.path_for_file(file);
            let mut attributes = vec![("rel", "stylesheet"), ("type", "text/css"), ("href", &*href)];
            if let Some(media) = attrs.media.as_deref() {
                attributes.push(("media", media));
            }
            out.push_str(&create_tag("link", &attributes, None));
            out.push('\n');
        }
        for (_, css) in registry.inline_css() {
            let content = format!("\n{css}\n");
            out.push_str(&create_tag("style", &[("type", "text/css")], Some(&content)));
            out.push('\n');
        }
        out
    }

    /// Script files in registration order, then inline scripts.
    fn script_fragment(&self, registry: &AssetRegistry, nonce: &str) -> String {
        let mut out = String::new();
        for (file, attrs) in registry.javascript() {
            let script_type = attrs.script_type.as_deref().unwrap_or(CLASSIC_TYPE);
            let src = self.resolver.path_for_file(file);
            let mut attributes = vec![("type", script_type), ("src", &*src), ("nonce", nonce)];
            if attrs.async_load {
                attributes.push(("async", "async"));
            }
            if attrs.defer == Some(true) && script_type != MODULE_TYPE {
                attributes.push(("defer", "defer"));
            }
            if let Some(integrity) = attrs.integrity.as_deref() {
                attributes.push(("integrity", integrity));
            }
            if let Some(crossorigin) = attrs.crossorigin.as_deref() {
                attributes.push(("crossorigin", crossorigin));
            }
            if let Some(consent) = attrs.cookie_consent {
                attributes.push(("cookie-consent", consent.as_str()));
            }
            if attrs.nomodule {
                attributes.push(("nomodule", "nomodule"));
            }
            out.push_str(&create_tag("script", &attributes, None));
            out.push('\n');
        }
        for (id, script) in registry.inline_js() {
            out.push_str(&inline_script_tag(
                id,
                script,
                nonce,
                registry.enable_js_modules(),
            ));
            out.push('\n');
        }
        out
    }
}

fn inline_script_tag(id: &InlineId, script: &str, nonce: &str, enable_js_modules: bool) -> String {
    let mut script_type = if enable_js_modules {
        MODULE_TYPE
    } else {
        CLASSIC_TYPE
    };
    let mut cookie_consent = None;
    if let Some(name) = id.name() {
        if name.contains(JS_MODULE_MARKER) {
            script_type = MODULE_TYPE;
        }
        if let Some(consent) = name.rsplit('-').next().and_then(CookieConsent::from_name) {
            script_type = CONSENT_TYPE;
            cookie_consent = Some(consent);
        }
    }

    // consent-gated scripts run when the consent layer swaps their type, modules are deferred anyway
    let wrap = cookie_consent.is_none()
        && !script.contains(DOM_READY_MARKER)
        && script_type != MODULE_TYPE;
    let script = strip_comments(script);
    let body = if wrap {
        format!("window.addEventListener('DOMContentLoaded', function() {{ {script} }});")
    } else {
        script.into_owned()
    };

    let mut attributes = vec![("type", script_type), ("nonce", nonce)];
    if let Some(consent) = cookie_consent {
        attributes.push(("cookie-consent", consent.as_str()));
    }
    create_tag(
        "script",
        &attributes,
        Some(&format!("//<![CDATA[\n{body}\n//]]>")),
    )
}

/// Remove block comments and line comments from a script.
///
/// A `//` right after `:`, `\`, `'` or `"` is kept so URLs and escapes
/// survive. This is a textual heuristic, not a tokenizer: other `//`
/// sequences inside string literals are stripped too.
#[must_use]
pub fn strip_comments(script: &str) -> Cow<'_, str> {
    let mut out = String::new();
    let mut last = 0;
    let mut pos = 0;
    let mut changed = false;
    while let Some(m) = COMMENTS.find_at(script, pos) {
        let protected = m.as_str().starts_with("//")
            && script[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| matches!(c, ':' | '\\' | '\'' | '"'));
        if protected {
            pos = m.start() + 1;
            continue;
        }
        out.push_str(&script[last..m.start()]);
        last = m.end();
        pos = m.end();
        changed = true;
    }
    if !changed {
        return Cow::Borrowed(script);
    }
    out.push_str(&script[last..]);
    Cow::Owned(out)
}
