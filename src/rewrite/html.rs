//! HTML rewriting: URL-bearing attributes, srcset, meta refresh, and the
//! client runtime injection.
//!
//! The rewriter is a tolerant text transform, not a structural parser. That
//! is deliberate: outside the rewritten attribute values the document's
//! bytes pass through untouched, so quirks-mode soup and inline templating
//! survive round-trips.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::rewrite::urls::{resolve_proxy_url, rewrite_srcset};

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)((?:src|href|action|poster|formaction|background|data|cite)\s*=\s*["'])([^"']*)(["'])"#,
    )
    .unwrap()
});

static SRCSET_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)((?:srcset|imagesrcset)\s*=\s*["'])([^"']*)(["'])"#).unwrap()
});

static BASE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<base\b[^>]*>").unwrap());

static BASE_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).unwrap());

static META_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<meta\b[^>]*>").unwrap());

static REFRESH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)http-equiv\s*=\s*["']?refresh["']?"#).unwrap());

static CONTENT_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(content\s*=\s*["'])([^"']*)(["'])"#).unwrap());

static HEAD_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head\b[^>]*>").unwrap());

static HTML_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<html\b[^>]*>").unwrap());

/// Rewrite an HTML document so every statically visible URL routes through
/// the proxy, then inject the client runtime.
///
/// `target_url` is the upstream URL this document was fetched from; it seeds
/// both relative-reference resolution and the runtime's base cell.
pub fn rewrite_html(proxy_origin: &str, target_url: &str, html: &str) -> String {
    // A <base href> overrides the document URL for relative resolution. The
    // tag itself must survive untouched so the client runtime sees the true
    // upstream base.
    let base = effective_base(target_url, html);
    let base_ranges: Vec<Range<usize>> = BASE_TAG_RE.find_iter(html).map(|m| m.range()).collect();

    let rewritten = ATTR_RE.replace_all(html, |caps: &Captures| {
        let span = caps.get(0).unwrap().range();
        if base_ranges.iter().any(|r| r.start <= span.start && span.end <= r.end) {
            return caps[0].to_string();
        }
        format!(
            "{}{}{}",
            &caps[1],
            resolve_proxy_url(proxy_origin, &caps[2], &base),
            &caps[3]
        )
    });

    let rewritten = SRCSET_ATTR_RE.replace_all(&rewritten, |caps: &Captures| {
        format!(
            "{}{}{}",
            &caps[1],
            rewrite_srcset(proxy_origin, &caps[2], &base),
            &caps[3]
        )
    });

    let rewritten = META_TAG_RE.replace_all(&rewritten, |caps: &Captures| {
        rewrite_meta_refresh(proxy_origin, &caps[0], &base)
    });

    inject_runtime(target_url, &rewritten)
}

/// Resolve the document's effective base: the first `<base href>` value if
/// present (itself resolved against the target URL), else the target URL.
fn effective_base(target_url: &str, html: &str) -> String {
    let href = BASE_TAG_RE
        .find(html)
        .and_then(|tag| BASE_HREF_RE.captures(tag.as_str()))
        .map(|caps| caps[1].to_string());
    match href {
        Some(href) => url::Url::parse(target_url)
            .ok()
            .and_then(|t| t.join(&href).ok())
            .map(|u| u.to_string())
            .unwrap_or(href),
        None => target_url.to_string(),
    }
}

/// Rewrite the `url=` part of a `<meta http-equiv="refresh">` content value.
fn rewrite_meta_refresh(proxy_origin: &str, tag: &str, base: &str) -> String {
    if !REFRESH_RE.is_match(tag) {
        return tag.to_string();
    }
    CONTENT_ATTR_RE
        .replace(tag, |caps: &Captures| {
            let value = &caps[2];
            match value.to_ascii_lowercase().find("url=") {
                Some(idx) => {
                    let (prefix, rest) = value.split_at(idx + 4);
                    format!(
                        "{}{}{}{}",
                        &caps[1],
                        prefix,
                        resolve_proxy_url(proxy_origin, rest.trim(), base),
                        &caps[3]
                    )
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Build the two-tag runtime bootstrap snippet for a page at `target_url`.
fn runtime_snippet(target_url: &str) -> String {
    let base_json =
        serde_json::to_string(target_url).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "<script>window.__internex_base = {base_json};</script>\n<script src=\"/internex.runtime.js\"></script>"
    )
}

/// Insert the runtime snippet: after `<head>` when present, else inside a
/// synthesized `<head>` after `<html>`, else prepended to the document.
fn inject_runtime(target_url: &str, html: &str) -> String {
    let snippet = runtime_snippet(target_url);

    if let Some(head) = HEAD_OPEN_RE.find(html) {
        let mut out = String::with_capacity(html.len() + snippet.len());
        out.push_str(&html[..head.end()]);
        out.push_str(&snippet);
        out.push_str(&html[head.end()..]);
        return out;
    }

    if let Some(open) = HTML_OPEN_RE.find(html) {
        let mut out = String::with_capacity(html.len() + snippet.len() + 13);
        out.push_str(&html[..open.end()]);
        out.push_str("<head>");
        out.push_str(&snippet);
        out.push_str("</head>");
        out.push_str(&html[open.end()..]);
        return out;
    }

    format!("{snippet}{html}")
}
