//! # repo-env
//!
//! Syncs the deployment variables and secrets declared in `.repo-env.json` to
//! GitHub environments or Bitbucket deployment environments.
//!
//! ## Usage
//!
//! ```bash
//! # Sync using ./.repo-env.json
//! repo-env
//!
//! # Use another document and fail the process if any entry failed
//! repo-env --file deploy/envs.json --strict
//! ```
//!
//! Exits with status 1 and a one-line message on stderr when the document is
//! missing or invalid. Per-entry failures are logged and, unless `--strict` is
//! set, do not change the exit status.

use anyhow::Result;
use clap::Parser;
use repo_env_sync::config::RuntimeConfig;
use repo_env_sync::observability;
use repo_env_sync::reconciler::Reconciler;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

/// Sync declared environment variables and secrets to GitHub or Bitbucket
#[derive(Parser, Debug)]
#[command(name = "repo-env", version, long_version = long_version())]
struct Cli {
    /// Desired-state document (defaults to REPO_ENV_FILE or ./.repo-env.json)
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Exit non-zero when any entry failed or any environment was aborted
    #[arg(long)]
    strict: bool,

    /// Log output format: text or json (defaults to LOG_FORMAT or text)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Log level (defaults to LOG_LEVEL or info)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("BUILD_GIT_HASH"),
        ", built ",
        env!("BUILD_DATETIME"),
        ")"
    )
}

impl Cli {
    fn apply(self, mut config: RuntimeConfig) -> RuntimeConfig {
        if let Some(file) = self.file {
            config.document_path = file;
        }
        if self.strict {
            config.strict = true;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().apply(RuntimeConfig::from_env());

    if let Err(e) = observability::init_tracing(&config) {
        eprintln!("❌ {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RuntimeConfig) -> Result<ExitCode> {
    info!(
        "Starting repo-env {} (git {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH")
    );

    let strict = config.strict;
    let report = Reconciler::from_config(config)?.run().await?;

    if strict && report.has_failures() {
        warn!(
            "Strict mode: {} entries failed, {} environments aborted",
            report.failed_entries(),
            report.aborted_environments()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
