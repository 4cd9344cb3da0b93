//! # Reconciler
//!
//! Walks the desired-state document and drives the platform's driver once per
//! runnable environment.
//!
//! Environments are processed strictly one after another, in document order,
//! each to completion before the next begins. A discovery failure aborts only
//! that environment; it is recorded in the [`RunReport`] and the run moves on.

use crate::config::RuntimeConfig;
use crate::document::DesiredStateDocument;
use crate::error::DocumentError;
use crate::provider::{driver_for, EnvironmentOutcome};
use crate::transport::{HttpTransport, ReqwestTransport};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

/// Result for one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentReport {
    /// Discovery succeeded; per-entry results inside
    Synced(EnvironmentOutcome),
    /// The environment could not be addressed; no entries were attempted
    Aborted { environment: String, reason: String },
}

impl EnvironmentReport {
    #[must_use]
    pub fn environment(&self) -> &str {
        match self {
            EnvironmentReport::Synced(outcome) => &outcome.environment,
            EnvironmentReport::Aborted { environment, .. } => environment,
        }
    }
}

/// Everything that happened during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub environments: Vec<EnvironmentReport>,
}

impl RunReport {
    /// Entries that failed across all synced environments
    #[must_use]
    pub fn failed_entries(&self) -> usize {
        self.environments
            .iter()
            .map(|report| match report {
                EnvironmentReport::Synced(outcome) => outcome.failed(),
                EnvironmentReport::Aborted { .. } => 0,
            })
            .sum()
    }

    /// Entries that were written successfully
    #[must_use]
    pub fn succeeded_entries(&self) -> usize {
        self.environments
            .iter()
            .map(|report| match report {
                EnvironmentReport::Synced(outcome) => outcome.succeeded(),
                EnvironmentReport::Aborted { .. } => 0,
            })
            .sum()
    }

    /// Environments whose discovery failed
    #[must_use]
    pub fn aborted_environments(&self) -> usize {
        self.environments
            .iter()
            .filter(|report| matches!(report, EnvironmentReport::Aborted { .. }))
            .count()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_entries() > 0 || self.aborted_environments() > 0
    }
}

/// Orchestrates one full reconciliation pass
pub struct Reconciler {
    transport: Arc<dyn HttpTransport>,
    config: RuntimeConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(transport: Arc<dyn HttpTransport>, config: RuntimeConfig) -> Self {
        Self { transport, config }
    }

    /// Build a reconciler backed by the real HTTP transport
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, ReconcilerError> {
        let transport = ReqwestTransport::new(config.http_timeout())?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Load the document named by the configuration and reconcile it
    ///
    /// # Errors
    /// Returns [`ReconcilerError::Document`] if the document is missing or invalid.
    pub async fn run(&self) -> Result<RunReport, ReconcilerError> {
        let document = DesiredStateDocument::load(
            &self.config.document_path,
            self.config.fallback_token.as_deref(),
        )?;
        Ok(self.reconcile(&document).await)
    }

    /// Sync every runnable environment of an already-validated document
    pub async fn reconcile(&self, document: &DesiredStateDocument) -> RunReport {
        let driver = driver_for(document.platform, Arc::clone(&self.transport), &self.config);
        let mut report = RunReport::default();

        for (environment, entries) in document.runnable_environments() {
            info!("🚀 Syncing {} → {}", environment, document.platform);

            let span = info_span!(
                "environment.sync",
                environment = environment,
                platform = document.platform.as_str()
            );
            let result = driver
                .sync(&document.credentials, environment, entries)
                .instrument(span)
                .await;

            let environment_report = match result {
                Ok(outcome) => {
                    info!(
                        "Finished {}: {} succeeded, {} failed",
                        environment,
                        outcome.succeeded(),
                        outcome.failed()
                    );
                    EnvironmentReport::Synced(outcome)
                }
                Err(e) => {
                    error!("❌ {} sync failed for {}: {:#}", document.platform, environment, e);
                    EnvironmentReport::Aborted {
                        environment: environment.to_string(),
                        reason: format!("{e:#}"),
                    }
                }
            };
            report.environments.push(environment_report);
        }

        info!(
            "Sync complete: {} environments, {} entries synced, {} entries failed, {} environments aborted",
            report.environments.len(),
            report.succeeded_entries(),
            report.failed_entries(),
            report.aborted_environments()
        );
        report
    }
}
