//! The proxy dispatcher: decode the target, attach cookies, fetch upstream,
//! filter headers, then rewrite or stream the body.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::headers::{ContentCategory, categorize, filter_response_headers, media_type_of};
use crate::rewrite::{css, html, js, urls};
use crate::state::AppState;
use crate::web::bridge;

/// `GET /proxy?url=<encoded>` (any method): fetch the decoded target and
/// relay it through the rewriting pipeline.
pub async fn handle_proxy(State(state): State<AppState>, req: Request) -> Response {
    match proxy_inner(state, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn proxy_inner(state: AppState, mut req: Request) -> Result<Response, ProxyError> {
    let raw = raw_url_param(req.uri().query())
        .ok_or_else(|| ProxyError::DecodeFailure("missing 'url' query parameter".to_string()))?;
    let target = urls::decode_proxy_url(&raw)
        .ok_or_else(|| ProxyError::DecodeFailure(raw.clone()))?;
    let origin = urls::origin_of(&target).unwrap_or_default();

    let cookie_header = state.sessions.cookie_header(&origin);
    let method = req.method().clone();
    let client_headers = req.headers().clone();

    // The upgrade handle must be taken before the body is consumed; it is
    // the hyper-era equivalent of hijacking the client socket.
    let on_upgrade = req.extensions_mut().remove::<hyper::upgrade::OnUpgrade>();
    let body = if matches!(method, Method::GET | Method::HEAD) {
        // Streaming an empty body would force chunked framing on requests
        // that must not carry one.
        reqwest::Body::from(Vec::new())
    } else {
        reqwest::Body::wrap_stream(req.into_body().into_data_stream())
    };

    let upstream = state
        .upstream
        .fetch(&target, method.clone(), &client_headers, &cookie_header, body)
        .await
        .map_err(ProxyError::UpstreamFailure)?;

    if upstream.status() == StatusCode::SWITCHING_PROTOCOLS {
        return bridge::bridge_websocket(on_upgrade, upstream);
    }

    state.sessions.absorb_set_cookies(&origin, upstream.headers());

    let status = upstream.status();
    let media_type = media_type_of(upstream.headers());
    let category = categorize(&media_type);
    let body_rewritten = category.is_rewritable() && method != Method::HEAD;
    let headers =
        filter_response_headers(upstream.headers(), &target, &state.proxy_origin, body_rewritten);

    tracing::debug!(
        target = %target,
        status = status.as_u16(),
        media_type = %media_type,
        category = ?category,
        "proxied"
    );

    if method == Method::HEAD {
        return Ok((status, headers, Body::empty()).into_response());
    }

    if category == ContentCategory::Other {
        // Non-rewritable bodies stream straight through, never buffered.
        let stream = upstream.bytes_stream();
        return Ok((status, headers, Body::from_stream(stream)).into_response());
    }

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::UpstreamFailure(e.into()))?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    let rewritten = match category {
        ContentCategory::Html => html::rewrite_html(&state.proxy_origin, &target, &content),
        ContentCategory::Css => css::rewrite_css(&state.proxy_origin, &target, &content),
        ContentCategory::Js => js::rewrite_js(&state.proxy_origin, &target, &content),
        ContentCategory::Other => content,
    };

    // Emit as an unsized stream: the rewritten length must not resurface
    // as a Content-Length header.
    let chunk = futures_util::stream::once(async move {
        Ok::<_, std::convert::Infallible>(bytes::Bytes::from(rewritten))
    });
    Ok((status, headers, Body::from_stream(chunk)).into_response())
}

/// Extract the still-encoded `url` parameter from a raw query string. The
/// codec owns all decoding, so the usual query extractors (which decode
/// eagerly) are bypassed here.
fn raw_url_param(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("url="))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_url_param_is_not_decoded() {
        let q = Some("url=https%3A%2F%2Fa.b%2Fc%3Fx%3D1%26y%3D2");
        assert_eq!(
            raw_url_param(q).as_deref(),
            Some("https%3A%2F%2Fa.b%2Fc%3Fx%3D1%26y%3D2")
        );
    }

    #[test]
    fn raw_url_param_missing_or_empty() {
        assert_eq!(raw_url_param(None), None);
        assert_eq!(raw_url_param(Some("other=1")), None);
        assert_eq!(raw_url_param(Some("url=")), None);
    }

    #[test]
    fn raw_url_param_ignores_other_pairs() {
        assert_eq!(
            raw_url_param(Some("a=1&url=https%3A%2F%2Fx.y&b=2")).as_deref(),
            Some("https%3A%2F%2Fx.y")
        );
    }
}
