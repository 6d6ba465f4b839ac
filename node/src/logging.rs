//! # Structured Logging
//!
//! One `tracing` subscriber per process, filtered by `RUST_LOG` when set
//! and by the node's default filter otherwise. Output goes to stderr; stdout
//! belongs to subcommands that print results (`quote`, `status`, `init`).

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Our crates at info, HTTP traces at debug.
pub const DEFAULT_FILTER: &str =
    "passlock_node=info,passlock_contracts=info,passlock_protocol=info,tower_http=debug";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Colored, multi-field lines for a terminal.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Installs the global subscriber.
///
/// `default_filter` applies only when `RUST_LOG` is unset, e.g.
/// `RUST_LOG=passlock_contracts=debug` to see every rejected operation.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_filter: &str, format: LogFormat) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init()?,
    }

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
