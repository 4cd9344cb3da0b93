//! # Constants
//!
//! Shared constants used throughout the sync tool.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default desired-state document file name (resolved against the working directory)
pub const DEFAULT_DOCUMENT_FILE: &str = ".repo-env.json";

/// Default GitHub REST API base URL
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default Bitbucket Cloud REST API base URL
pub const DEFAULT_BITBUCKET_API_URL: &str = "https://api.bitbucket.org/2.0";

/// Default transport request timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// GitHub media type sent in the `Accept` header
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// GitHub REST API version pinned in `X-GitHub-Api-Version`
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Status codes GitHub returns when a variable create collides with an existing one.
///
/// 409 is "already exists", 422 is "validation failed" because the name is taken.
/// Only these switch a create into an update; everything else is a real failure.
pub const GITHUB_CONFLICT_STATUSES: [u16; 2] = [409, 422];

/// User agent sent with every request (GitHub rejects requests without one)
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Upper bound on followed `next` links while paging a Bitbucket listing
pub const MAX_LISTING_PAGES: usize = 100;
