//! # Provider Drivers
//!
//! One driver per hosting provider. Each implements [`SyncDriver`], which turns
//! "ensure these entries exist in environment X" into that provider's resource
//! model and HTTP call sequence.
//!
//! - [`github::GithubDriver`]: verb-dispatch (seal + PUT secrets, POST then PATCH variables)
//! - [`bitbucket::BitbucketDriver`]: name-keyed upsert (discover ids, then PUT or POST)

use crate::config::RuntimeConfig;
use crate::document::{Credentials, EntrySpec, Platform};
use crate::transport::HttpTransport;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

// Common utilities shared across providers
pub mod common;

// Provider implementations
pub mod bitbucket;
pub mod github;

pub use bitbucket::BitbucketDriver;
pub use github::GithubDriver;

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// Entry did not exist and was created
    Created,
    /// Entry existed and was overwritten
    Updated,
    /// Secret was sealed and upserted (the provider does not say which)
    SecretSynced,
}

impl EntryAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Created => "created",
            EntryAction::Updated => "updated",
            EntryAction::SecretSynced => "secret synced",
        }
    }
}

/// Per-entry result. Failures carry the rendered error chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub key: String,
    pub result: Result<EntryAction, String>,
}

impl EntryOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// Result of syncing one environment whose discovery succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentOutcome {
    pub environment: String,
    pub entries: Vec<EntryOutcome>,
}

impl EnvironmentOutcome {
    pub fn new(environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failure()).count()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.entries.len() - self.failed()
    }
}

/// Provider driver
///
/// `sync` returns `Err` only when the environment as a whole could not be
/// addressed (discovery failed). Per-entry failures are recorded in the
/// returned [`EnvironmentOutcome`] and never stop the remaining entries.
#[async_trait]
pub trait SyncDriver: Send + Sync {
    /// Platform this driver talks to
    fn platform(&self) -> Platform;

    /// Converge `entries` into `environment`, one entry at a time, in order
    async fn sync(
        &self,
        credentials: &Credentials,
        environment: &str,
        entries: &[EntrySpec],
    ) -> Result<EnvironmentOutcome>;
}

/// Pick the driver for a platform
pub fn driver_for(
    platform: Platform,
    transport: Arc<dyn HttpTransport>,
    config: &RuntimeConfig,
) -> Box<dyn SyncDriver> {
    match platform {
        Platform::Github => Box::new(GithubDriver::new(transport, &config.github_api_url)),
        Platform::Bitbucket => Box::new(BitbucketDriver::new(transport, &config.bitbucket_api_url)),
    }
}
