//! Security headers for HTTP responses.
//!
//! Referrer-Policy, HSTS and X-Frame-Options come from static configuration;
//! the Content-Security-Policy carries the per-request nonce so that only the
//! scripts this service injected are allowed to run.

use axum::{
    extract::Request,
    http::{
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_FRAME_OPTIONS,
        },
        HeaderMap, HeaderName, HeaderValue,
    },
};

use crate::config::SecurityHeadersConfig;

pub const CONTENT_SECURITY_POLICY_REPORT_ONLY: HeaderName =
    HeaderName::from_static("content-security-policy-report-only");

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Whether `request` arrived over TLS.
///
/// Server-side request URIs rarely carry a scheme, so behind a proxy the
/// `X-Forwarded-Proto` header is consulted when it is trusted.
#[must_use]
pub fn is_secure_request(request: &Request, trust_forwarded_proto: bool) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    trust_forwarded_proto
        && request
            .headers()
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Add Referrer-Policy, HSTS (secure requests only) and X-Frame-Options.
///
/// An X-Frame-Options value already set by the handler is left alone.
pub fn apply_security_headers(
    headers: &mut HeaderMap,
    config: &SecurityHeadersConfig,
    secure: bool,
) {
    if !config.default_referrer_policy.is_empty() {
        insert(headers, REFERRER_POLICY, &config.default_referrer_policy);
    }

    // HSTS is ignored by browsers over plain HTTP and must not leak there
    if config.enable_hsts && !config.hsts_header.is_empty() && secure {
        insert(headers, STRICT_TRANSPORT_SECURITY, &config.hsts_header);
    }

    if !config.frame_options.is_empty() && !headers.contains_key(X_FRAME_OPTIONS) {
        insert(headers, X_FRAME_OPTIONS, &config.frame_options);
    }
}

/// Build the strict-dynamic policy for `nonce`.
///
/// Browsers that understand `'strict-dynamic'` ignore the `'unsafe-inline'`
/// and scheme fallbacks; older ones use them.
#[must_use]
pub fn build_content_security_policy(config: &SecurityHeadersConfig, nonce: &str) -> String {
    let mut csp = String::from("default-src 'self' data:;");
    csp.push_str(&format!(
        "script-src 'nonce-{nonce}' 'strict-dynamic' 'unsafe-inline' 'unsafe-eval' https: http:;"
    ));
    csp.push_str("style-src * 'unsafe-inline';");
    csp.push_str("object-src 'self';");
    csp.push_str("img-src * data:;");
    csp.push_str("font-src * data:;");

    if !config.frame_ancestors.is_empty() {
        csp.push_str(&format!("frame-ancestors {};", config.frame_ancestors));
    }
    if let Some(report_uri) = report_uri(config) {
        csp.push_str(&format!("report-uri {report_uri}"));
    }
    csp
}

/// Header name the policy is sent under.
///
/// Report-only mode needs an endpoint; without one the policy is enforced.
#[must_use]
pub fn content_security_policy_header(config: &SecurityHeadersConfig) -> HeaderName {
    if report_uri(config).is_some() && config.csp_report_only {
        CONTENT_SECURITY_POLICY_REPORT_ONLY
    } else {
        CONTENT_SECURITY_POLICY
    }
}

/// Add the nonce-based CSP. No-op over plain HTTP or when CSP is disabled.
pub fn apply_content_security_policy(
    headers: &mut HeaderMap,
    config: &SecurityHeadersConfig,
    nonce: &str,
    secure: bool,
) {
    if !secure || !config.enable_csp {
        return;
    }
    let policy = build_content_security_policy(config, nonce);
    insert(headers, content_security_policy_header(config), &policy);
}

fn report_uri(config: &SecurityHeadersConfig) -> Option<&str> {
    config.csp_report_uri.as_deref().filter(|uri| !uri.is_empty())
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "invalid header value in configuration, skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
        headers.get(name).map(|v| v.to_str().unwrap_or_default())
    }

    fn csp_config() -> SecurityHeadersConfig {
        SecurityHeadersConfig {
            enable_csp: true,
            ..SecurityHeadersConfig::default()
        }
    }

    #[test]
    fn test_security_headers_default_secure() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, &SecurityHeadersConfig::default(), true);

        assert_eq!(
            header(&headers, &REFERRER_POLICY),
            Some("no-referrer-when-downgrade")
        );
        assert_eq!(
            header(&headers, &STRICT_TRANSPORT_SECURITY),
            Some("max-age=300; includeSubDomains; preload; always;")
        );
        assert_eq!(header(&headers, &X_FRAME_OPTIONS), Some("SAMEORIGIN"));
    }

    #[test]
    fn test_no_hsts_on_insecure_request() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, &SecurityHeadersConfig::default(), false);

        assert!(!headers.contains_key(STRICT_TRANSPORT_SECURITY));
        assert!(headers.contains_key(REFERRER_POLICY));
    }

    #[test]
    fn test_hsts_disabled_or_empty() {
        for config in [
            SecurityHeadersConfig {
                enable_hsts: false,
                ..SecurityHeadersConfig::default()
            },
            SecurityHeadersConfig {
                hsts_header: String::new(),
                ..SecurityHeadersConfig::default()
            },
        ] {
            let mut headers = HeaderMap::new();
            apply_security_headers(&mut headers, &config, true);
            assert!(!headers.contains_key(STRICT_TRANSPORT_SECURITY));
        }
    }

    #[test]
    fn test_frame_options_not_overridden() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        apply_security_headers(&mut headers, &SecurityHeadersConfig::default(), true);
        assert_eq!(header(&headers, &X_FRAME_OPTIONS), Some("DENY"));
    }

    #[test]
    fn test_empty_values_skip_headers() {
        let config = SecurityHeadersConfig {
            default_referrer_policy: String::new(),
            frame_options: String::new(),
            ..SecurityHeadersConfig::default()
        };
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, &config, false);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_policy_skeleton() {
        let policy = build_content_security_policy(&csp_config(), "abc");
        assert_eq!(
            policy,
            "default-src 'self' data:;\
             script-src 'nonce-abc' 'strict-dynamic' 'unsafe-inline' 'unsafe-eval' https: http:;\
             style-src * 'unsafe-inline';\
             object-src 'self';\
             img-src * data:;\
             font-src * data:;\
             frame-ancestors 'self';"
        );
    }

    #[test]
    fn test_policy_with_report_uri_and_no_frame_ancestors() {
        let config = SecurityHeadersConfig {
            frame_ancestors: String::new(),
            csp_report_uri: Some("/csp-report".into()),
            ..csp_config()
        };
        let policy = build_content_security_policy(&config, "abc");
        assert!(!policy.contains("frame-ancestors"));
        assert!(policy.ends_with("font-src * data:;report-uri /csp-report"));
    }

    #[test]
    fn test_csp_header_name_selection() {
        let cases = [
            (Some("/csp"), true, CONTENT_SECURITY_POLICY_REPORT_ONLY, "report-only with endpoint"),
            (Some("/csp"), false, CONTENT_SECURITY_POLICY, "enforced with endpoint"),
            (None, true, CONTENT_SECURITY_POLICY, "report-only without endpoint"),
            (None, false, CONTENT_SECURITY_POLICY, "enforced without endpoint"),
            (Some(""), true, CONTENT_SECURITY_POLICY, "empty endpoint"),
        ];

        for (uri, report_only, expected, desc) in cases {
            let config = SecurityHeadersConfig {
                csp_report_uri: uri.map(String::from),
                csp_report_only: report_only,
                ..csp_config()
            };
            assert_eq!(content_security_policy_header(&config), expected, "case '{desc}'");
        }
    }

    #[test]
    fn test_csp_skipped_when_insecure_or_disabled() {
        let mut headers = HeaderMap::new();
        apply_content_security_policy(&mut headers, &csp_config(), "abc", false);
        apply_content_security_policy(&mut headers, &SecurityHeadersConfig::default(), "abc", true);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_csp_applied_with_nonce() {
        let mut headers = HeaderMap::new();
        apply_content_security_policy(&mut headers, &csp_config(), "abc", true);
        let policy = header(&headers, &CONTENT_SECURITY_POLICY).unwrap_or_default();
        assert!(policy.contains("'nonce-abc'"));
    }

    #[test]
    fn test_secure_request_detection() {
        let https = axum::http::Request::builder()
            .uri("https://example.com/")
            .body(Body::empty())
            .unwrap();
        assert!(is_secure_request(&https, false));

        let forwarded = axum::http::Request::builder()
            .uri("/")
            .header(X_FORWARDED_PROTO, "HTTPS, http")
            .body(Body::empty())
            .unwrap();
        assert!(is_secure_request(&forwarded, true));
        assert!(!is_secure_request(&forwarded, false));

        let plain = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        assert!(!is_secure_request(&plain, true));
    }
}
