//! # Logging
//!
//! Tracing subscriber initialization.
//!
//! `RUST_LOG` takes precedence when set; otherwise the configured level is
//! applied to this crate only, so dependency noise (reqwest, hyper) stays quiet.

use crate::config::RuntimeConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to text for anything unrecognized
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Build the default filter directive for a level name
pub fn default_directive(level: &str) -> String {
    format!("repo_env_sync={}", level.trim().to_lowercase())
}

/// Install the global tracing subscriber
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &RuntimeConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match LogFormat::parse(&config.log_format) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
