//! Tracing subscriber setup.
//!
//! stdout carries the report and the terminal may belong to the TUI, so log
//! records go to the configured log file.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::PluginConfig;
use crate::error::AppError;

/// Install the global subscriber. `RUST_LOG` overrides `LOGGING_LEVEL`.
///
/// A second call is a no-op (the first subscriber stays installed).
pub fn init(config: &PluginConfig) -> Result<(), AppError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .map_err(|e| {
            AppError::new(
                2,
                format!("Failed to open log file '{}': {e}", config.log_file.display()),
            )
        })?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging_level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(())
}
