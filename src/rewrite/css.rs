//! CSS rewriting: `url(...)` references and string-form `@import` rules.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::rewrite::urls::resolve_proxy_url;

static URL_FN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*["']?([^"')]+)["']?\s*\)"#).unwrap());

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)@import\s+(["'])([^"']+)(["'])"#).unwrap());

/// Rewrite every URL reference in a stylesheet (or any CSS fragment, such as
/// an inline `style` attribute value) so it routes through the proxy.
///
/// When a reference resolves to itself the original text is kept
/// byte-for-byte, quoting and whitespace included.
pub fn rewrite_css(proxy_origin: &str, base_url: &str, css: &str) -> String {
    let pass_one = URL_FN_RE.replace_all(css, |caps: &Captures| {
        let raw = caps[1].trim();
        let resolved = resolve_proxy_url(proxy_origin, raw, base_url);
        if resolved == raw {
            caps[0].to_string()
        } else {
            format!("url(\"{resolved}\")")
        }
    });

    IMPORT_RE
        .replace_all(&pass_one, |caps: &Captures| {
            let raw = caps[2].trim();
            if raw.contains("/proxy?url=") {
                return caps[0].to_string();
            }
            let resolved = resolve_proxy_url(proxy_origin, raw, base_url);
            if resolved == raw {
                caps[0].to_string()
            } else {
                format!("@import {}{}{}", &caps[1], resolved, &caps[3])
            }
        })
        .into_owned()
}
