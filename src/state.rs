//! Application state shared across request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::session::SessionStore;
use crate::upstream::UpstreamClient;

/// Shared, cheaply cloneable handler state. The session store is the only
/// mutable member; everything else is fixed at startup.
#[derive(Clone)]
pub struct AppState {
    /// The `scheme://host[:port]` this proxy is externally reachable at.
    pub proxy_origin: Arc<str>,
    /// Root of the static asset tree (shell page, runtime script).
    pub assets_dir: Arc<PathBuf>,
    /// Per-upstream-origin cookies and storage.
    pub sessions: Arc<SessionStore>,
    /// HTTP client for upstream fetches.
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            proxy_origin: Arc::from(config.proxy_origin()),
            assets_dir: Arc::new(config.assets_dir.clone()),
            sessions: Arc::new(SessionStore::new()),
            upstream: UpstreamClient::new()?,
        })
    }
}
