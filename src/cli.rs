//! Command-line interface definition.
//!
//! Behavioral configuration comes from the environment (see `config`); the
//! CLI only selects presentation concerns.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    /// Human-readable log lines for a terminal.
    Pretty,
    /// One JSON object per line for log shippers.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "internex", about = "Intercepting web proxy")]
pub struct Args {
    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    pub tracing: TracingFormat,
}
