//! Upstream fetcher: builds and issues the outbound request for a decoded
//! target URL, including WebSocket handshake translation.

use std::time::Duration;

use anyhow::{Context, anyhow};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use url::Url;

use crate::headers::forward_request_headers;

/// Shared HTTP client tuned for long-lived streaming fetches.
///
/// No total or read timeout: streamed bodies must never be cut short by a
/// timer. Connection setup is bounded by the connect timeout alone.
/// Redirects are not followed; 3xx responses pass through so the rewritten
/// `Location` sends the browser back through the proxy for the next hop.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .http1_only()
            .build()
            .context("Failed to build upstream client")?;
        Ok(Self { http })
    }

    /// Fetch `target` with the §safe subset of the client's headers, the
    /// per-origin cookie string, and the client's body. `ws`/`wss` targets
    /// are translated to `http`/`https` for the handshake, with the upgrade
    /// headers forwarded verbatim.
    pub async fn fetch(
        &self,
        target: &str,
        method: Method,
        client_headers: &HeaderMap,
        cookie_header: &str,
        body: reqwest::Body,
    ) -> anyhow::Result<reqwest::Response> {
        let mut url = Url::parse(target).context("parsing target URL")?;

        match url.scheme() {
            "ws" => url
                .set_scheme("http")
                .map_err(|_| anyhow!("cannot translate ws scheme"))?,
            "wss" => url
                .set_scheme("https")
                .map_err(|_| anyhow!("cannot translate wss scheme"))?,
            _ => {}
        }

        let mut headers = forward_request_headers(client_headers);

        // Rewritable bodies must arrive uncompressed.
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

        let host = url
            .host_str()
            .map(|h| match url.port() {
                Some(port) => format!("{h}:{port}"),
                None => h.to_string(),
            })
            .context("target URL has no host")?;
        headers.insert(header::HOST, HeaderValue::from_str(&host)?);

        // Origin and Referer must name the upstream, not the proxy.
        if client_headers.contains_key(header::ORIGIN) {
            let upstream_origin = format!("{}://{}", url.scheme(), host);
            headers.insert(header::ORIGIN, HeaderValue::from_str(&upstream_origin)?);
        }
        if let Some(referer) = client_headers.get(header::REFERER) {
            let upstream_referer = referer
                .to_str()
                .ok()
                .and_then(decode_referer)
                .unwrap_or_else(|| target.to_string());
            headers.insert(header::REFERER, HeaderValue::from_str(&upstream_referer)?);
        }

        if !cookie_header.is_empty() {
            let merged = match headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
                Some(existing) => format!("{existing}; {cookie_header}"),
                None => cookie_header.to_string(),
            };
            headers.insert(header::COOKIE, HeaderValue::from_str(&merged)?);
        }

        if is_websocket_upgrade(client_headers) {
            headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
            headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
            for (name, value) in client_headers.iter() {
                if name.as_str().starts_with("sec-websocket-") {
                    headers.insert(name.clone(), value.clone());
                }
            }
        }

        let response = self
            .http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .context("upstream request failed")?;
        Ok(response)
    }
}

/// True when the client request carries a WebSocket upgrade.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let upgrading = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    let connection = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("upgrade"));
    upgrading && connection
}

/// Recover the upstream referer from a proxied Referer value by extracting
/// its `url` query parameter. `query_pairs` has already percent-decoded
/// the value, so it only needs to parse as a URL to be usable.
fn decode_referer(referer: &str) -> Option<String> {
    let url = Url::parse(referer).ok()?;
    let raw = url
        .query_pairs()
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned())?;
    if Url::parse(&raw).is_ok() { Some(raw) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_upgrade_detection() {
        let mut h = HeaderMap::new();
        assert!(!is_websocket_upgrade(&h));
        h.insert("upgrade", "websocket".parse().unwrap());
        assert!(!is_websocket_upgrade(&h));
        h.insert("connection", "keep-alive, Upgrade".parse().unwrap());
        assert!(is_websocket_upgrade(&h));
    }

    #[test]
    fn referer_decodes_proxied_form() {
        let referer = "http://localhost:8080/proxy?url=https%3A%2F%2Fexample.com%2Ffrom";
        assert_eq!(decode_referer(referer).as_deref(), Some("https://example.com/from"));
        assert_eq!(decode_referer("http://localhost:8080/other"), None);
    }
}
