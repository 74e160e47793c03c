//! Header policy: request forwarding allowlist, hop-by-hop and
//! embedding-blocker stripping, `Location` and `Set-Cookie` rewriting, and
//! content categorization.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

use crate::rewrite::urls::rewrite_location;

/// The only request headers forwarded from the browser to the upstream.
const SAFE_REQUEST_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-language",
    "accept-encoding",
    "content-type",
    "content-length",
    "user-agent",
    "referer",
    "origin",
    "authorization",
    "x-requested-with",
    "x-csrf-token",
    "if-modified-since",
    "if-none-match",
    "if-match",
    "if-unmodified-since",
    "cache-control",
    "range",
    "dnt",
];

/// Headers scoped to a single transport connection; forwarding them through
/// a proxy is a protocol violation.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers that would stop the proxied page from rendering inside
/// our context. Removed entirely.
const STRIPPED_SECURITY_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "x-content-security-policy",
    "cross-origin-opener-policy",
    "cross-origin-embedder-policy",
    "cross-origin-resource-policy",
    "x-frame-options",
    "referrer-policy",
    "strict-transport-security",
    "x-xss-protection",
    "permissions-policy",
];

/// What the dispatcher does with a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Html,
    Css,
    Js,
    Other,
}

impl ContentCategory {
    /// True when bodies of this category are buffered and rewritten.
    pub fn is_rewritable(self) -> bool {
        self != ContentCategory::Other
    }
}

/// Extract the lowercase media type from a `Content-Type` header set.
pub fn media_type_of(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|mt| !mt.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Map a media type to a content category.
pub fn categorize(media_type: &str) -> ContentCategory {
    if media_type.contains("html") {
        ContentCategory::Html
    } else if media_type == "text/css" {
        ContentCategory::Css
    } else if media_type.contains("javascript") {
        ContentCategory::Js
    } else {
        ContentCategory::Other
    }
}

/// Copy the safe subset of client request headers for the upstream request.
pub fn forward_request_headers(src: &HeaderMap) -> HeaderMap {
    let mut dst = HeaderMap::new();
    for &name in SAFE_REQUEST_HEADERS {
        if let Some(value) = src.get(name)
            && !value.is_empty()
        {
            dst.insert(HeaderName::from_static(name), value.clone());
        }
    }
    dst
}

/// Filter upstream response headers for the client: hop-by-hop and security
/// headers are dropped, `Location` and `Set-Cookie` are rewritten, and
/// `Content-Length` is dropped when the body will be rewritten.
pub fn filter_response_headers(
    src: &HeaderMap,
    target_url: &str,
    proxy_origin: &str,
    body_rewritten: bool,
) -> HeaderMap {
    let mut dst = HeaderMap::new();
    for (name, value) in src.iter() {
        let key = name.as_str();
        if HOP_BY_HOP_HEADERS.contains(&key) || STRIPPED_SECURITY_HEADERS.contains(&key) {
            continue;
        }
        if body_rewritten && name == header::CONTENT_LENGTH {
            continue;
        }

        if *name == header::LOCATION {
            let rewritten = value
                .to_str()
                .map(|loc| rewrite_location(target_url, loc))
                .unwrap_or_default();
            if let Ok(v) = HeaderValue::from_str(&rewritten) {
                dst.append(header::LOCATION, v);
            }
        } else if *name == header::SET_COOKIE {
            if let Ok(raw) = value.to_str()
                && let Ok(v) = HeaderValue::from_str(&rewrite_set_cookie(raw, proxy_origin))
            {
                dst.append(header::SET_COOKIE, v);
            }
        } else {
            dst.append(name.clone(), value.clone());
        }
    }
    dst
}

/// Rewrite a `Set-Cookie` header so the browser stores the cookie under the
/// proxy's host: `Domain` and `SameSite` are stripped (`Secure` too when the
/// proxy is plain http), then `SameSite=None` is appended, plus `Secure`
/// when the proxy is https.
pub fn rewrite_set_cookie(set_cookie: &str, proxy_origin: &str) -> String {
    let mut out = strip_cookie_attr(set_cookie, "domain");
    out = strip_cookie_attr(&out, "samesite");
    if proxy_origin.starts_with("http://") {
        out = strip_cookie_attr(&out, "secure");
    }
    out.push_str("; SameSite=None");
    if proxy_origin.starts_with("https://") {
        out.push_str("; Secure");
    }
    out
}

/// Remove one attribute (with or without a value) from a Set-Cookie string.
fn strip_cookie_attr(cookie: &str, attr: &str) -> String {
    cookie
        .split(';')
        .map(str::trim)
        .filter(|segment| {
            let lower = segment.to_ascii_lowercase();
            lower != attr && !lower.starts_with(&format!("{attr}="))
        })
        .collect::<Vec<_>>()
        .join("; ")
}
