//! Environment-driven configuration.

use std::path::PathBuf;

use anyhow::Context;
use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Process configuration, loaded once at startup and never reassigned.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hostname the proxy is reachable at; feeds the proxy origin.
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory the static asset server reads from.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Base tracing level for the crate (overridable via RUST_LOG).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from the environment (PORT, HOST, ASSETS_DIR,
    /// LOG_LEVEL).
    pub fn load() -> anyhow::Result<Self> {
        Figment::new()
            .merge(Env::raw())
            .extract()
            .context("Failed to load config from environment")
    }

    /// The proxy origin string, e.g. `http://localhost:8080`. Drives URL
    /// construction and cookie attribute policy.
    pub fn proxy_origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Address the listener binds to (all interfaces; `host` only names the
    /// externally reachable origin).
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
