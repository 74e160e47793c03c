//! Direct rewrite endpoints: `POST /rewrite/{html,css,js}` run the
//! corresponding rewriter over the request body.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::rewrite::{css, html, js};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RewriteParams {
    /// Optional base URL for resolving relative references in the body.
    #[serde(default)]
    pub base: String,
}

pub async fn rewrite_html_body(
    State(state): State<AppState>,
    Query(params): Query<RewriteParams>,
    body: Bytes,
) -> Response {
    let content = String::from_utf8_lossy(&body);
    respond(
        html::rewrite_html(&state.proxy_origin, &params.base, &content),
        "text/html; charset=utf-8",
    )
}

pub async fn rewrite_css_body(
    State(state): State<AppState>,
    Query(params): Query<RewriteParams>,
    body: Bytes,
) -> Response {
    let content = String::from_utf8_lossy(&body);
    respond(
        css::rewrite_css(&state.proxy_origin, &params.base, &content),
        "text/css; charset=utf-8",
    )
}

pub async fn rewrite_js_body(
    State(state): State<AppState>,
    Query(params): Query<RewriteParams>,
    body: Bytes,
) -> Response {
    let content = String::from_utf8_lossy(&body);
    respond(
        js::rewrite_js(&state.proxy_origin, &params.base, &content),
        "application/javascript; charset=utf-8",
    )
}

fn respond(content: String, content_type: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    (headers, content).into_response()
}
