//! Demo page exercising the requirements API.

use axum::{
    response::{Html, IntoResponse, Response},
    Extension,
};

use crate::assets::{ScriptOptions, StyleAttributes};
use crate::error::RequirementsError;
use crate::http::requirements::PageRequirements;

const HOME_TEMPLATE: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head>
<title>defer-backend</title>
</head>
<body>
<main id=\"app\">Loading...</main>
</body>
</html>";

/// `GET /` - a page registering a bit of everything.
pub async fn home_page(Extension(requirements): Extension<PageRequirements>) -> Response {
    match register_home_requirements(&requirements) {
        Ok(()) => Html(HOME_TEMPLATE).into_response(),
        Err(err) => err.into_response(),
    }
}

fn register_home_requirements(requirements: &PageRequirements) -> Result<(), RequirementsError> {
    requirements.head_tag(None, "<meta charset=\"utf-8\">");
    requirements.css("themes/simple/css/layout.css", StyleAttributes::default());
    requirements.css("css/base.css", StyleAttributes::default());
    requirements.css("css/print.css", StyleAttributes::media("print"));
    requirements.javascript("js/app.js", ScriptOptions::default())?;
    requirements.javascript(
        "js/analytics.js",
        ScriptOptions::with_cookie_consent("tracking"),
    )?;
    if let Err(err) = requirements.themed_javascript("menu", None) {
        tracing::debug!(error = %err, "theme has no menu script");
    }
    requirements.custom_script(
        Some("app-init"),
        "document.getElementById('app').textContent = 'Ready';",
    );
    Ok(())
}
