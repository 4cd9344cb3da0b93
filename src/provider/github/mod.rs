//! # GitHub Driver
//!
//! Verb-dispatch driver for GitHub environment secrets and variables.
//!
//! - **Secrets** (`secured: true`): fetch the environment's public key (fresh for
//!   every entry, so a rotation mid-run never produces a stale seal), seal the
//!   value, then `PUT` it. `PUT` is an upsert, so no existence check is made.
//! - **Variables** (`secured: false`): `POST` to create; on a conflict-class
//!   status (see [`GITHUB_CONFLICT_STATUSES`]) switch to `PATCH` by name. Any
//!   other failure (401, 403, 404 for a missing environment) fails the entry.
//!
//! References:
//! - [Environment secrets](https://docs.github.com/en/rest/actions/secrets#create-or-update-an-environment-secret)
//! - [Environment variables](https://docs.github.com/en/rest/actions/variables#create-an-environment-variable)

mod requests;
mod responses;

use crate::constants::{GITHUB_ACCEPT, GITHUB_API_VERSION, GITHUB_CONFLICT_STATUSES};
use crate::crypto;
use crate::document::{Credentials, EntrySpec, Platform, Scope};
use crate::provider::common::{api_error, ensure_success, join_url, record_entry};
use crate::provider::{EntryAction, EnvironmentOutcome, SyncDriver};
use crate::transport::{HttpRequest, HttpTransport};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, debug_span, Instrument};

use requests::{PutSecretRequest, VariableRequest};
use responses::PublicKeyResponse;

/// Whether a failed create status means "already exists, update instead"
#[must_use]
pub fn is_conflict(status: u16) -> bool {
    GITHUB_CONFLICT_STATUSES.contains(&status)
}

/// Per-variable write state: `Creating -> (conflict) -> Updating`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariableWrite {
    Creating,
    Updating,
}

/// GitHub environment driver
pub struct GithubDriver {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl std::fmt::Debug for GithubDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubDriver")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Resolved `owner/repo/environment` target for one sync call
struct Target<'a> {
    owner: &'a str,
    repo: &'a str,
    environment: &'a str,
    headers: Vec<(&'static str, String)>,
}

impl GithubDriver {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, target: &Target<'_>, tail: &[&str]) -> Result<String> {
        let mut segments = vec![
            "repos",
            target.owner,
            target.repo,
            "environments",
            target.environment,
        ];
        segments.extend_from_slice(tail);
        join_url(&self.base_url, &segments)
    }

    async fn send(&self, request: HttpRequest) -> Result<crate::transport::HttpResponse> {
        self.transport.send(request).await
    }

    async fn fetch_public_key(&self, target: &Target<'_>) -> Result<PublicKeyResponse> {
        let url = self.url(target, &["secrets", "public-key"])?;
        let response = self
            .send(HttpRequest::new(Method::GET, url).headers(&target.headers))
            .await?;
        ensure_success("fetch public key", response)?.json()
    }

    async fn sync_secret(&self, target: &Target<'_>, entry: &EntrySpec) -> Result<EntryAction> {
        let public_key = self
            .fetch_public_key(target)
            .await
            .with_context(|| format!("Failed to fetch public key for secret {}", entry.key))?;

        let sealer = crypto::sealer().await?;
        let encrypted_value = sealer
            .seal(entry.text_value().as_bytes(), &public_key.key)
            .with_context(|| format!("Failed to seal secret {}", entry.key))?;

        let body = serde_json::to_value(PutSecretRequest {
            encrypted_value,
            key_id: public_key.key_id,
        })?;
        let url = self.url(target, &["secrets", entry.key.as_str()])?;
        let response = self
            .send(
                HttpRequest::new(Method::PUT, url)
                    .headers(&target.headers)
                    .json(body),
            )
            .await?;
        ensure_success("put secret", response)?;

        Ok(EntryAction::SecretSynced)
    }

    async fn sync_variable(&self, target: &Target<'_>, entry: &EntrySpec) -> Result<EntryAction> {
        let body = serde_json::to_value(VariableRequest {
            name: entry.key.clone(),
            value: entry.text_value(),
        })?;

        let mut state = VariableWrite::Creating;
        loop {
            match state {
                VariableWrite::Creating => {
                    let url = self.url(target, &["variables"])?;
                    let response = self
                        .send(
                            HttpRequest::new(Method::POST, url)
                                .headers(&target.headers)
                                .json(body.clone()),
                        )
                        .await?;
                    if response.is_success() {
                        return Ok(EntryAction::Created);
                    }
                    if !is_conflict(response.status) {
                        return Err(api_error("create variable", &response).into());
                    }
                    debug!(
                        status = response.status,
                        "Variable {} already exists, updating", entry.key
                    );
                    state = VariableWrite::Updating;
                }
                VariableWrite::Updating => {
                    let url = self.url(target, &["variables", entry.key.as_str()])?;
                    let response = self
                        .send(
                            HttpRequest::new(Method::PATCH, url)
                                .headers(&target.headers)
                                .json(body.clone()),
                        )
                        .await?;
                    ensure_success("update variable", response)?;
                    return Ok(EntryAction::Updated);
                }
            }
        }
    }
}

#[async_trait]
impl SyncDriver for GithubDriver {
    fn platform(&self) -> Platform {
        Platform::Github
    }

    async fn sync(
        &self,
        credentials: &Credentials,
        environment: &str,
        entries: &[EntrySpec],
    ) -> Result<EnvironmentOutcome> {
        let Scope::Repository { owner, repo } = &credentials.scope else {
            bail!("GitHub sync requires an owner/repo scope");
        };
        let target = Target {
            owner,
            repo,
            environment,
            headers: vec![
                ("Authorization", credentials.bearer()),
                ("Accept", GITHUB_ACCEPT.to_string()),
                ("X-GitHub-Api-Version", GITHUB_API_VERSION.to_string()),
            ],
        };

        let mut outcome = EnvironmentOutcome::new(environment);
        for entry in entries {
            let span = debug_span!("github.entry", entry.key = %entry.key, entry.secured = entry.secured);
            let result = async {
                if entry.secured {
                    self.sync_secret(&target, entry).await
                } else {
                    self.sync_variable(&target, entry).await
                }
            }
            .instrument(span)
            .await;
            outcome
                .entries
                .push(record_entry(environment, &entry.key, result));
        }
        Ok(outcome)
    }
}
