//! Logging initialization utilities.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::LogLevel;

/// Initialize logging with the specified level.
///
/// Logs go to stderr so stdout stays clean for program output, or are
/// appended to `log_file` when one is given.
pub fn init_logging(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let level: Level = level.into();

    let builder = fmt::Subscriber::builder().with_max_level(level);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
