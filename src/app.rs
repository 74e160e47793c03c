//! Application wiring: configuration, shared state, router, listener.

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::state::AppState;
use crate::web::create_router;

/// The assembled application, ready to serve.
pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// Wire configuration into shared state and the upstream client.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let state = AppState::new(&config)?;
        Ok(Self { config, state })
    }

    /// Bind the listener and serve until the process is terminated.
    pub async fn run(self) -> anyhow::Result<()> {
        let router = create_router(self.state);
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        info!(
            addr = %addr,
            proxy_origin = %self.config.proxy_origin(),
            assets_dir = %self.config.assets_dir.display(),
            "listening"
        );

        axum::serve(listener, router)
            .await
            .context("server error")
    }
}
