//! repo-env-sync library
//!
//! Reconciles the entries declared in a `.repo-env.json` document against
//! GitHub environment secrets/variables or Bitbucket deployment variables.
//! Tests are included in the module files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use repo_env_sync::config::RuntimeConfig;
//! use repo_env_sync::reconciler::Reconciler;
//!
//! # async fn example() -> Result<(), repo_env_sync::reconciler::ReconcilerError> {
//! let report = Reconciler::from_config(RuntimeConfig::from_env())?.run().await?;
//! println!("{} entries failed", report.failed_entries());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod crypto;
pub mod document;
pub mod error;
pub mod observability;
pub mod provider;
pub mod reconciler;
pub mod transport;
