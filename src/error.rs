//! Proxy error types and their HTTP mappings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors a request handler can surface to the client.
///
/// Rewrite failures are deliberately absent: the rewriters are total
/// functions that fall back to returning their input, so a broken page
/// degrades to passthrough instead of a 5xx.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("missing or invalid proxied URL: {0}")]
    DecodeFailure(String),
    #[error("upstream fetch failed")]
    UpstreamFailure(#[source] anyhow::Error),
    #[error("websocket bridge failed")]
    BridgeFailure(#[source] anyhow::Error),
    #[error("path escapes the assets directory")]
    Forbidden,
    #[error("asset not found")]
    AssetNotFound,
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::DecodeFailure(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamFailure(_) | ProxyError::BridgeFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::Forbidden => StatusCode::FORBIDDEN,
            ProxyError::AssetNotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ProxyError::UpstreamFailure(source) => {
                tracing::warn!(error = ?source, "upstream fetch failed");
            }
            ProxyError::BridgeFailure(source) => {
                tracing::warn!(error = ?source, "websocket bridge failed");
            }
            _ => {}
        }
        (status, self.to_string()).into_response()
    }
}
