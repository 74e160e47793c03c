//! Static asset server: serves the shell page and the client runtime from
//! the configured assets directory.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Uri, header};
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::state::AppState;

/// Extension to media type table for served assets.
const MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "application/javascript; charset=utf-8"),
    ("json", "application/json; charset=utf-8"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
];

/// Fallback handler: `GET /` serves `index.html`, anything else is looked
/// up relative to the assets directory.
pub async fn serve_asset(State(state): State<AppState>, uri: Uri) -> Response {
    match serve(&state.assets_dir, uri.path()).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn serve(assets_dir: &Path, url_path: &str) -> Result<Response, ProxyError> {
    let relative = if url_path == "/" {
        "index.html"
    } else {
        url_path.trim_start_matches('/')
    };

    let clean = normalize(relative).ok_or(ProxyError::Forbidden)?;
    let full = assets_dir.join(&clean);

    let data = tokio::fs::read(&full)
        .await
        .map_err(|_| ProxyError::AssetNotFound)?;

    let content_type = full
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| {
            MIME_TYPES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        })
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream");

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    Ok((headers, Body::from(data)).into_response())
}

/// Resolve `.` and `..` segments. `None` when the path would escape the
/// assets root.
fn normalize(relative: &str) -> Option<PathBuf> {
    let mut stack: Vec<&str> = Vec::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }
    if stack.is_empty() {
        return None;
    }
    Some(stack.iter().copied().collect())
}
