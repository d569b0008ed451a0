// Logging module - Logging infrastructure
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Filter directive used when `RUST_LOG` is not set
pub fn default_directive(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    format!("cube={},tower_http={},warn", level, level)
}

/// Initialize logging system
///
/// `RUST_LOG` wins over the configured level; `verbose` forces debug.
pub fn init_logging(level: &str, verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level, verbose)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(verbose)
                .with_file(verbose)
                .with_line_number(verbose)
        )
        .try_init()?;

    tracing::debug!("Cube logging system initialized");
    Ok(())
}
