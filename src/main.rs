use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use internex::app::App;
use internex::cli::Args;
use internex::config::Config;
use internex::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config before logging setup so startup logs are never silently dropped.
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        proxy_origin = %config.proxy_origin(),
        "starting internex"
    );

    let app = match App::new(config) {
        Ok(app) => app,
        Err(err) => {
            error!(error = ?err, "failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "server exited with error");
            ExitCode::FAILURE
        }
    }
}
