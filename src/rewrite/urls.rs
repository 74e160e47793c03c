//! Proxy URL encoding, decoding, and static resolution.
//!
//! Every URL that leaves the proxy is routed through the canonical form
//! `/proxy?url=<form-urlencoded target>`. `resolve_proxy_url` classifies a
//! raw reference (absolute, protocol-relative, root-relative, relative,
//! scheme-special) and produces its proxied form given a base URL.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;
use url::form_urlencoded;

/// Schemes a decoded target URL may carry. The ws/wss to http/https
/// translation happens in the upstream fetcher, not here.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

static JAVASCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*javascript\s*:").unwrap());

static ABSOLUTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(https?|wss?)://").unwrap());

/// Encode a target URL into the path-only proxy form: `/proxy?url=<encoded>`.
pub fn encode_proxy_path(target: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/proxy?url={encoded}")
}

/// Encode a target URL into the full proxy form, with the proxy origin prepended.
pub fn encode_proxy_url(proxy_origin: &str, target: &str) -> String {
    format!("{}{}", proxy_origin.trim_end_matches('/'), encode_proxy_path(target))
}

/// Decode the `url` query-parameter value back to the original target URL.
///
/// Succeeds only when decoding yields valid UTF-8 that parses as a URL with
/// an http/https/ws/wss scheme. No trimming, no normalization: the decoded
/// string is returned as-is so `decode(encode(t)) == t`.
pub fn decode_proxy_url(encoded: &str) -> Option<String> {
    let unplussed = encoded.replace('+', " ");
    let decoded = percent_decode_str(&unplussed).decode_utf8().ok()?;
    let parsed = Url::parse(&decoded).ok()?;
    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return None;
    }
    Some(decoded.into_owned())
}

/// Extract `scheme://host[:port]` from a URL string.
pub fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Rewrite an upstream `Location` header value so the redirect routes back
/// through the proxy. Relative redirects resolve against the target URL
/// that produced the response.
pub fn rewrite_location(target: &str, location: &str) -> String {
    if location.is_empty() {
        return String::new();
    }
    let resolved = Url::parse(target)
        .ok()
        .and_then(|base| base.join(location).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| location.to_string());
    encode_proxy_path(&resolved)
}

/// Resolve a raw in-page URL reference into its proxied form.
///
/// Classification rules, first match wins:
/// 1. empty, fragment, `about:blank`, `data:`/`blob:`/`mailto:`/`tel:` pass through
/// 2. `javascript:` collapses to `javascript:void(0)`
/// 3. already-proxied values pass through (idempotence)
/// 4. protocol-relative gains the base's scheme, then resolves as absolute
/// 5. absolute http(s)/ws(s) is encoded; a URL pointing at the proxy itself
///    is first remapped onto the base's origin to break ping-pong loops
/// 6. root-relative resolves against the base origin
/// 7. anything else resolves against the full base URL
///
/// With no usable base, rules 6 and 7 leave the input untouched.
pub fn resolve_proxy_url(proxy_origin: &str, raw: &str, base: &str) -> String {
    if raw.is_empty()
        || raw.starts_with('#')
        || raw.eq_ignore_ascii_case("about:blank")
        || has_scheme_prefix(raw, "data:")
        || has_scheme_prefix(raw, "blob:")
        || has_scheme_prefix(raw, "mailto:")
        || has_scheme_prefix(raw, "tel:")
    {
        return raw.to_string();
    }

    if JAVASCRIPT_RE.is_match(raw) {
        return "javascript:void(0)".to_string();
    }

    if raw.contains("/proxy?url=") {
        return raw.to_string();
    }

    // Protocol-relative: borrow the base's scheme, default https.
    let absolute;
    let candidate = if let Some(rest) = raw.strip_prefix("//") {
        let scheme = Url::parse(base)
            .map(|b| b.scheme().to_string())
            .unwrap_or_else(|_| "https".to_string());
        absolute = format!("{scheme}://{rest}");
        absolute.as_str()
    } else {
        raw
    };

    if ABSOLUTE_RE.is_match(candidate) {
        return encode_proxy_path(&unloop(proxy_origin, candidate, base));
    }

    if candidate.starts_with('/') {
        return match origin_of(base) {
            Some(base_origin) => encode_proxy_path(&format!("{base_origin}{candidate}")),
            None => raw.to_string(),
        };
    }

    match Url::parse(base).ok().and_then(|b| b.join(candidate).ok()) {
        Some(resolved) => encode_proxy_path(resolved.as_str()),
        None => raw.to_string(),
    }
}

/// Rewrite a `srcset` attribute value: each comma-separated entry has its
/// first whitespace-delimited token (the URL) replaced with its rewrite.
pub fn rewrite_srcset(proxy_origin: &str, srcset: &str, base: &str) -> String {
    srcset
        .split(',')
        .map(|entry| {
            let entry = entry.trim();
            match entry.split_once(char::is_whitespace) {
                Some((url, descriptor)) => format!(
                    "{} {}",
                    resolve_proxy_url(proxy_origin, url, base),
                    descriptor.trim_start()
                ),
                None => resolve_proxy_url(proxy_origin, entry, base),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// True when `raw` starts with `scheme` ignoring ASCII case. Indexing must
/// respect char boundaries for non-ASCII input.
fn has_scheme_prefix(raw: &str, scheme: &str) -> bool {
    raw.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

/// Remap an absolute URL that points back at the proxy host onto the base's
/// upstream origin. Leaves every other absolute URL untouched.
fn unloop(proxy_origin: &str, candidate: &str, base: &str) -> String {
    let (Ok(proxy), Ok(url)) = (Url::parse(proxy_origin), Url::parse(candidate)) else {
        return candidate.to_string();
    };
    let same_host = proxy.host_str().is_some()
        && proxy.host_str() == url.host_str()
        && proxy.port_or_known_default() == url.port_or_known_default();
    if !same_host {
        return candidate.to_string();
    }
    let Some(base_origin) = origin_of(base) else {
        return candidate.to_string();
    };

    let mut remapped = format!("{base_origin}{}", url.path());
    if let Some(query) = url.query() {
        remapped.push('?');
        remapped.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        remapped.push('#');
        remapped.push_str(fragment);
    }
    remapped
}
