//! # Common Provider Utilities
//!
//! Shared helpers used by both drivers: URL building, error extraction from
//! provider error bodies, and uniform per-entry outcome logging.

use super::{EntryAction, EntryOutcome};
use crate::error::ApiError;
use crate::transport::HttpResponse;
use anyhow::{anyhow, Result};
use reqwest::Url;
use serde::Deserialize;
use tracing::{error, info};

/// Append percent-encoded path segments to a base URL
///
/// # Errors
/// Returns an error if `base` is not an absolute http(s) URL.
pub fn join_url(base: &str, segments: &[&str]) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| anyhow!("Invalid API base URL {base}: {e}"))?;
    url.path_segments_mut()
        .map_err(|()| anyhow!("API base URL cannot carry a path: {base}"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<NestedError>,
}

#[derive(Debug, Deserialize)]
struct NestedError {
    #[serde(default)]
    message: Option<String>,
}

/// Best human-readable message from a provider error body.
///
/// GitHub answers `{"message": ...}`, Bitbucket `{"error": {"message": ...}}`.
/// Anything else falls back to the raw body.
pub fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error.and_then(|e| e.message).or(parsed.message) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "<empty response body>".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turn a non-success response into an [`ApiError`]
pub fn api_error(operation: &'static str, response: &HttpResponse) -> ApiError {
    ApiError {
        operation,
        status: response.status,
        message: error_message(&response.body),
    }
}

/// Fail with [`ApiError`] unless the response is 2xx
///
/// # Errors
/// Returns the [`ApiError`] for any non-success status.
pub fn ensure_success(operation: &'static str, response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(api_error(operation, &response).into())
    }
}

/// Log and wrap the result of one entry
pub fn record_entry(environment: &str, key: &str, result: Result<EntryAction>) -> EntryOutcome {
    let result = match result {
        Ok(action) => {
            info!("✅ {}: {} - {}", capitalize(action.as_str()), environment, key);
            Ok(action)
        }
        Err(e) => {
            error!("❌ Error: {} - {}: {:#}", environment, key, e);
            Err(format!("{e:#}"))
        }
    };
    EntryOutcome {
        key: key.to_string(),
        result,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
