//! # Runtime Configuration
//!
//! Run-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BITBUCKET_API_URL, DEFAULT_DOCUMENT_FILE, DEFAULT_GITHUB_API_URL,
    DEFAULT_HTTP_TIMEOUT_SECS,
};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// CLI flags are applied on top of this in `main.rs`.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Path of the desired-state document
    pub document_path: PathBuf,
    /// Token used when the document does not carry one
    pub fallback_token: Option<String>,
    /// GitHub API base URL (overridable for mock servers)
    pub github_api_url: String,
    /// Bitbucket API base URL (overridable for mock servers)
    pub bitbucket_api_url: String,
    /// Per-request timeout applied by the transport (seconds)
    pub http_timeout_secs: u64,
    /// Crate log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Exit non-zero when any entry failed or any environment was aborted
    pub strict: bool,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("document_path", &self.document_path)
            .field("fallback_token", &self.fallback_token.as_ref().map(|_| "<redacted>"))
            .field("github_api_url", &self.github_api_url)
            .field("bitbucket_api_url", &self.bitbucket_api_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("strict", &self.strict)
            .finish()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from(DEFAULT_DOCUMENT_FILE),
            fallback_token: None,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            bitbucket_api_url: DEFAULT_BITBUCKET_API_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            strict: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            document_path: PathBuf::from(env_var_or_default_str(
                "REPO_ENV_FILE",
                DEFAULT_DOCUMENT_FILE,
            )),
            fallback_token: std::env::var("REPO_ENV_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            github_api_url: trim_base_url(env_var_or_default_str(
                "GITHUB_API_URL",
                DEFAULT_GITHUB_API_URL,
            )),
            bitbucket_api_url: trim_base_url(env_var_or_default_str(
                "BITBUCKET_API_URL",
                DEFAULT_BITBUCKET_API_URL,
            )),
            http_timeout_secs: env_var_or_default("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            log_level: env_var_or_default_str("LOG_LEVEL", "info"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            strict: env_var_or_default_bool("REPO_ENV_STRICT", false),
        }
    }

    /// Get transport request timeout duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}
