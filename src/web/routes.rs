//! Router construction.

use axum::Router;
use axum::routing::{any, post};

use crate::state::AppState;
use crate::web::middleware::request_log::RequestLogLayer;
use crate::web::{assets, proxy, rewrite};

/// Build the proxy's router: the proxy endpoint (all methods, so the
/// runtime's XHR/fetch traffic passes through unchanged), the direct
/// rewrite endpoints, and the static asset fallback.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/proxy", any(proxy::handle_proxy))
        .route("/rewrite/html", post(rewrite::rewrite_html_body))
        .route("/rewrite/css", post(rewrite::rewrite_css_body))
        .route("/rewrite/js", post(rewrite::rewrite_js_body))
        .fallback(assets::serve_asset)
        .layer(RequestLogLayer)
        .with_state(state)
}
