//! Minimal tag building for the injected fragments.

use std::borrow::Cow;

const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

#[inline]
const fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape an attribute value. Borrows when nothing needs escaping.
#[must_use]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains(&ESCAPE_CHARS[..]) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => out.push_str(entity),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Build `<tag a="b">content</tag>`.
///
/// Attributes with an empty value are skipped. Void elements get no closing
/// tag and no self-closing slash.
#[must_use]
pub fn create_tag(tag: &str, attributes: &[(&str, &str)], content: Option<&str>) -> String {
    let mut out = format!("<{tag}");
    for (name, value) in attributes.iter().filter(|(_, value)| !value.is_empty()) {
        out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
    }
    out.push('>');
    if is_void_element(tag) {
        return out;
    }
    if let Some(content) = content {
        out.push_str(content);
    }
    out.push_str(&format!("</{tag}>"));
    out
}

fn is_void_element(tag: &str) -> bool {
    matches!(tag, "link" | "meta" | "base" | "br" | "hr" | "img" | "input")
}
