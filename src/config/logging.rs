//! Global tracing subscriber for the binary.

use super::settings::LoggingConfig;
use crate::errors::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level.
/// With a `log_file` the output is appended there without ANSI colours,
/// otherwise it goes to stderr.
///
/// # Errors
/// Returns [`Error::Io`] if the log file cannot be opened and
/// [`Error::Config`] if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(&config.level);
    let installed = match &config.log_file {
        Some(path) => {
            crate::storage::ensure_parent_dir(path)?;
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|e| Error::Config {
        message: format!("Failed to install tracing subscriber: {e}"),
    })
}
