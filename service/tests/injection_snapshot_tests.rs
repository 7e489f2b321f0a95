//! Snapshot of a fully injected document.
//!
//! Run `cargo insta review` to inspect and approve intentional changes.

use defer_backend::{
    assets::{ScriptOptions, StyleAttributes},
    inject::HtmlInjector,
    registry::AssetRegistry,
    RequirementsError,
};

const DOCUMENT: &str = "<!DOCTYPE html>
<html>
<head>
<title>Snapshot</title>
</head>
<body>
<main></main>
</body>
</html>";

#[test]
fn injected_document() -> Result<(), RequirementsError> {
    let mut registry = AssetRegistry::new(false);
    registry.register_head_tag(None, "<meta charset=\"utf-8\">");
    registry.register_css("themes/simple/css/layout.css", StyleAttributes::default());
    registry.register_css("css/base.css", StyleAttributes::default());
    registry.register_css("css/print.css", StyleAttributes::media("print"));
    registry.register_inline_css(None, "main { display: grid; }");
    registry.register_js("js/app.js", ScriptOptions::default())?;
    registry.register_js(
        "https://cdn.example.com/lib.js",
        ScriptOptions {
            async_load: true,
            defer: Some(false),
            integrity: Some("sha384-abc".into()),
            crossorigin: Some("anonymous".into()),
            ..ScriptOptions::default()
        },
    )?;
    registry.register_js(
        "js/analytics.js",
        ScriptOptions::with_cookie_consent("tracking"),
    )?;
    registry.register_inline_js(
        Some("app-init"),
        "start('https://api.example.com'); // boot",
    );
    registry.register_inline_js(Some("widgets-jsmodule"), "import('/js/widgets.js');");
    registry.register_inline_js(Some("pixel-targeting"), "pixel();");

    let html = HtmlInjector::default().inject(DOCUMENT, &mut registry, "snapshot-nonce");
    insta::assert_snapshot!("injected_document", html);
    Ok(())
}
