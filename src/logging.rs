//! Configure and initialize logging for the application.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::TracingFormat;
use crate::config::Config;

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured base level when set.
pub fn setup_logging(config: &Config, format: TracingFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,internex={}", config.log_level))
    });

    match format {
        TracingFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .init();
        }
        TracingFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true).json())
                .init();
        }
    }
}
