//! Global subscriber: human console output plus daily JSON files.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Rolled files are named `focusmate.log.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "focusmate.log";

/// Install the global logger.
///
/// `RUST_LOG` wins over `level`. A second call keeps the first subscriber.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Result<()> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(log_dir)
        .context("Failed to open rolling log file")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json_files = fmt::layer()
        .json()
        .with_current_span(false)
        .with_writer(file_appender)
        .with_ansi(false);
    let console = fmt::layer().with_target(false).compact();

    if tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(json_files)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logger already installed");
    }
    Ok(())
}
