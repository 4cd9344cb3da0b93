//! # Errors
//!
//! Typed errors for the conditions callers need to tell apart.
//! Everything else travels as `anyhow::Error` with context.

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the desired-state document. All of these are fatal for the run.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse desired-state document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Desired-state document must be a JSON object")]
    NotAnObject,

    #[error("Missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid environment \"{environment}\": {source}")]
    InvalidEnvironment {
        environment: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate key \"{key}\" in environment \"{environment}\"")]
    DuplicateKey { environment: String, key: String },
}

/// A provider answered with a non-success status
#[derive(Debug, Error)]
#[error("{operation} failed with HTTP {status}: {message}")]
pub struct ApiError {
    pub operation: &'static str,
    pub status: u16,
    pub message: String,
}

/// Discovery could not resolve an environment name on the provider
#[derive(Debug, Error)]
#[error("Environment \"{environment}\" not found in {platform}.")]
pub struct EnvironmentNotFound {
    pub environment: String,
    pub platform: &'static str,
}
