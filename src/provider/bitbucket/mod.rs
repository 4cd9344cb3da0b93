//! # Bitbucket Driver
//!
//! Name-keyed upsert driver for Bitbucket Cloud deployment environments.
//!
//! Discovery runs once per environment before any write:
//! 1. list environments and resolve the name (case-insensitive) to its uuid
//! 2. list that environment's variables into a `key -> uuid` lookup
//!
//! Then each entry is `PUT` to its existing uuid or `POST`ed as new. A
//! discovery failure aborts the environment; a write failure only fails that
//! entry. Secured entries are flagged `secured: true` and left to Bitbucket to
//! protect; nothing is sealed client-side.

mod requests;
mod responses;

use crate::constants::MAX_LISTING_PAGES;
use crate::document::{Credentials, EntrySpec, Platform, Scope};
use crate::error::EnvironmentNotFound;
use crate::provider::common::{ensure_success, join_url, record_entry};
use crate::provider::{EntryAction, EnvironmentOutcome, SyncDriver};
use crate::transport::{HttpRequest, HttpTransport};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, debug_span, Instrument};

use requests::VariableRequest;
use responses::{Environment, Page, Variable};

/// Bitbucket deployment environment driver
pub struct BitbucketDriver {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl std::fmt::Debug for BitbucketDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitbucketDriver")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BitbucketDriver {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch every page of a collection, following `next` links
    async fn list_all<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        first_url: String,
        headers: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid API base URL {}", self.base_url))?;
        let mut items = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_LISTING_PAGES {
                bail!("{operation}: more than {MAX_LISTING_PAGES} pages, giving up");
            }
            let response = self
                .transport
                .send(HttpRequest::new(Method::GET, url).headers(headers))
                .await?;
            let page: Page<T> = ensure_success(operation, response)?.json()?;
            items.extend(page.values);
            next = page
                .next
                .map(|link| same_origin_link(&base, link))
                .transpose()?;
        }

        Ok(items)
    }

    /// Resolve an environment display name to its uuid
    async fn resolve_environment(
        &self,
        repository_url: &[&str],
        environment: &str,
        headers: &[(&'static str, String)],
    ) -> Result<String> {
        let mut segments = repository_url.to_vec();
        segments.push("environments");
        let url = join_url(&self.base_url, &segments)?;

        let environments: Vec<Environment> = self
            .list_all("list environments", url, headers)
            .await
            .context("Failed to list Bitbucket environments")?;

        let wanted = environment.to_lowercase();
        environments
            .into_iter()
            .find(|env| env.name.to_lowercase() == wanted)
            .map(|env| env.uuid)
            .ok_or_else(|| {
                EnvironmentNotFound {
                    environment: environment.to_string(),
                    platform: "Bitbucket",
                }
                .into()
            })
    }

    async fn write_entry(
        &self,
        variables_url: &[&str],
        existing: &HashMap<String, String>,
        entry: &EntrySpec,
        headers: &[(&'static str, String)],
    ) -> Result<EntryAction> {
        let body = serde_json::to_value(VariableRequest {
            key: entry.key.clone(),
            value: entry.text_value(),
            secured: entry.secured,
        })?;

        if let Some(uuid) = existing.get(&entry.key) {
            let mut segments = variables_url.to_vec();
            segments.push(uuid);
            let url = join_url(&self.base_url, &segments)?;
            let response = self
                .transport
                .send(HttpRequest::new(Method::PUT, url).headers(headers).json(body))
                .await?;
            ensure_success("update variable", response)?;
            Ok(EntryAction::Updated)
        } else {
            let url = join_url(&self.base_url, variables_url)?;
            let response = self
                .transport
                .send(HttpRequest::new(Method::POST, url).headers(headers).json(body))
                .await?;
            ensure_success("create variable", response)?;
            Ok(EntryAction::Created)
        }
    }
}

/// Accept a `next` link only if it stays on the API host the token was issued for
fn same_origin_link(base: &Url, link: String) -> Result<String> {
    let url = Url::parse(&link).with_context(|| format!("Invalid pagination link {link}"))?;
    if url.origin() != base.origin() {
        bail!(
            "Refusing to follow pagination link to {}",
            url.host_str().unwrap_or("<no host>")
        );
    }
    Ok(link)
}

#[async_trait]
impl SyncDriver for BitbucketDriver {
    fn platform(&self) -> Platform {
        Platform::Bitbucket
    }

    async fn sync(
        &self,
        credentials: &Credentials,
        environment: &str,
        entries: &[EntrySpec],
    ) -> Result<EnvironmentOutcome> {
        let Scope::Workspace { workspace, repo } = &credentials.scope else {
            bail!("Bitbucket sync requires a workspace/repo scope");
        };
        let headers = vec![
            ("Authorization", credentials.bearer()),
            ("Content-Type", "application/json".to_string()),
        ];
        let repository_url = ["repositories", workspace.as_str(), repo.as_str()];

        // Discovery: both steps are fatal for the environment
        let env_uuid = self
            .resolve_environment(&repository_url, environment, &headers)
            .await?;
        debug!("Resolved Bitbucket environment {} to {}", environment, env_uuid);

        let variables_url: Vec<&str> = repository_url
            .iter()
            .copied()
            .chain([
                "deployments_config",
                "environments",
                env_uuid.as_str(),
                "variables",
            ])
            .collect();
        let existing: HashMap<String, String> = self
            .list_all::<Variable>(
                "list variables",
                join_url(&self.base_url, &variables_url)?,
                &headers,
            )
            .await
            .with_context(|| format!("Failed to list variables for environment {environment}"))?
            .into_iter()
            .map(|v| (v.key, v.uuid))
            .collect();
        debug!(
            "Environment {} has {} existing variables",
            environment,
            existing.len()
        );

        let mut outcome = EnvironmentOutcome::new(environment);
        for entry in entries {
            let span = debug_span!("bitbucket.entry", entry.key = %entry.key, entry.secured = entry.secured);
            let result = self
                .write_entry(&variables_url, &existing, entry, &headers)
                .instrument(span)
                .await;
            outcome
                .entries
                .push(record_entry(environment, &entry.key, result));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::transport::testing::{empty, reply, RecordingTransport};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    const REPO: &str = "https://api.bitbucket.org/2.0/repositories/ws/r";
    const VARS: &str = "https://api.bitbucket.org/2.0/repositories/ws/r/deployments_config/environments/%7Benv-demo%7D/variables";

    fn credentials() -> Credentials {
        Credentials {
            token: "t".to_string(),
            scope: Scope::Workspace {
                workspace: "ws".to_string(),
                repo: "r".to_string(),
            },
        }
    }

    fn entry(key: &str, value: Value, secured: bool) -> EntrySpec {
        EntrySpec {
            key: key.to_string(),
            value,
            secured,
        }
    }

    fn driver(transport: &Arc<RecordingTransport>) -> BitbucketDriver {
        BitbucketDriver::new(
            Arc::clone(transport) as Arc<dyn HttpTransport>,
            "https://api.bitbucket.org/2.0",
        )
    }

    /// Fake Bitbucket with one environment "Demo" and the given existing variables
    fn provider(existing: Value) -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport::new(move |req| {
            match (req.method.as_str(), req.url.as_str()) {
                ("GET", url) if url == format!("{REPO}/environments") => reply(
                    200,
                    json!({"values": [
                        {"name": "Production", "uuid": "{env-prod}"},
                        {"name": "Demo", "uuid": "{env-demo}"}
                    ]}),
                ),
                ("GET", url) if url == VARS => reply(200, json!({"values": existing})),
                ("POST", _) => reply(201, json!({"uuid": "{new}"})),
                ("PUT", _) => reply(200, json!({})),
                _ => empty(404),
            }
        }))
    }

    #[tokio::test]
    async fn test_existing_secured_entry_is_updated_by_uuid() {
        let transport = provider(json!([{"key": "DB_PASS", "uuid": "{var-1}"}]));
        let outcome = driver(&transport)
            .sync(
                &credentials(),
                "demo",
                &[entry("DB_PASS", json!("hunter2"), true)],
            )
            .await
            .unwrap();

        assert_eq!(transport.count_method(&Method::POST), 0);
        assert_eq!(transport.count_method(&Method::PUT), 1);
        let put = transport
            .requests()
            .into_iter()
            .find(|r| r.method == Method::PUT)
            .unwrap();
        assert_eq!(put.url, format!("{VARS}/%7Bvar-1%7D"));
        assert_eq!(
            put.body,
            Some(json!({"key": "DB_PASS", "value": "hunter2", "secured": true}))
        );
        assert_eq!(outcome.entries[0].result, Ok(EntryAction::Updated));
    }

    #[tokio::test]
    async fn test_discovery_runs_once_regardless_of_entry_count() {
        let transport = provider(json!([{"key": "A", "uuid": "{a}"}]));
        let entries: Vec<EntrySpec> = ["A", "B", "C", "D"]
            .iter()
            .map(|k| entry(k, json!("v"), false))
            .collect();
        let outcome = driver(&transport)
            .sync(&credentials(), "demo", &entries)
            .await
            .unwrap();

        assert_eq!(transport.count(&Method::GET, "/environments"), 1);
        assert_eq!(transport.count(&Method::GET, "/variables"), 1);
        assert_eq!(transport.count_method(&Method::PUT), 1);
        assert_eq!(transport.count_method(&Method::POST), 3);
        let actions: Vec<EntryAction> = outcome
            .entries
            .iter()
            .map(|e| e.result.clone().unwrap())
            .collect();
        assert_eq!(
            actions,
            vec![
                EntryAction::Updated,
                EntryAction::Created,
                EntryAction::Created,
                EntryAction::Created
            ]
        );
    }

    #[tokio::test]
    async fn test_create_posts_to_variables_collection() {
        let transport = provider(json!([]));
        driver(&transport)
            .sync(
                &credentials(),
                "DEMO",
                &[entry("CFG", json!({"x": 1}), false)],
            )
            .await
            .unwrap();
        let post = transport
            .requests()
            .into_iter()
            .find(|r| r.method == Method::POST)
            .unwrap();
        assert_eq!(post.url, VARS);
        assert_eq!(
            post.body,
            Some(json!({"key": "CFG", "value": r#"{"x":1}"#, "secured": false}))
        );
    }

    #[tokio::test]
    async fn test_unknown_environment_aborts_before_any_write() {
        let transport = provider(json!([]));
        let err = driver(&transport)
            .sync(&credentials(), "staging", &[entry("A", json!("1"), true)])
            .await
            .unwrap_err();

        let not_found = err.downcast_ref::<EnvironmentNotFound>().unwrap();
        assert_eq!(not_found.environment, "staging");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_variable_listing_failure_aborts_environment() {
        let transport = Arc::new(RecordingTransport::new(|req| {
            if req.url.ends_with("/environments") {
                reply(200, json!({"values": [{"name": "demo", "uuid": "{env-demo}"}]}))
            } else {
                reply(403, json!({"type": "error", "error": {"message": "Forbidden"}}))
            }
        }));
        let err = driver(&transport)
            .sync(&credentials(), "demo", &[entry("A", json!("1"), true)])
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("Forbidden"));
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 403);
        assert_eq!(transport.count_method(&Method::POST), 0);
        assert_eq!(transport.count_method(&Method::PUT), 0);
    }

    #[tokio::test]
    async fn test_entry_failure_does_not_stop_remaining_entries() {
        let transport = Arc::new(RecordingTransport::new(|req| {
            if req.method == Method::GET && req.url.ends_with("/environments") {
                return reply(200, json!({"values": [{"name": "demo", "uuid": "{env-demo}"}]}));
            }
            if req.method == Method::GET {
                return reply(200, json!({"values": []}));
            }
            if req.body.as_ref().is_some_and(|b| b["key"] == "BAD") {
                return reply(400, json!({"type": "error", "error": {"message": "Invalid key"}}));
            }
            reply(201, json!({}))
        }));
        let outcome = driver(&transport)
            .sync(
                &credentials(),
                "demo",
                &[
                    entry("BAD", json!("1"), false),
                    entry("GOOD", json!("2"), false),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.failed(), 1);
        assert!(outcome.entries[0]
            .result
            .clone()
            .unwrap_err()
            .contains("Invalid key"));
        assert_eq!(outcome.entries[1].result, Ok(EntryAction::Created));
    }

    #[tokio::test]
    async fn test_discovery_follows_pagination() {
        let transport = Arc::new(RecordingTransport::new(|req| {
            match req.url.as_str() {
                url if url == format!("{REPO}/environments") => reply(
                    200,
                    json!({"values": [{"name": "other", "uuid": "{o}"}], "next": "https://api.bitbucket.org/2.0/page2"}),
                ),
                "https://api.bitbucket.org/2.0/page2" => {
                    reply(200, json!({"values": [{"name": "demo", "uuid": "{env-demo}"}]}))
                }
                url if url == VARS => reply(200, json!({"values": [{"key": "A", "uuid": "{a}"}]})),
                _ => reply(200, json!({})),
            }
        }));
        let outcome = driver(&transport)
            .sync(&credentials(), "demo", &[entry("A", json!("1"), true)])
            .await
            .unwrap();
        assert_eq!(transport.count_method(&Method::GET), 3);
        assert_eq!(outcome.entries[0].result, Ok(EntryAction::Updated));
    }

    #[tokio::test]
    async fn test_pagination_link_to_other_host_is_not_followed() {
        let transport = Arc::new(RecordingTransport::new(|req| {
            if req.url == format!("{REPO}/environments") {
                reply(
                    200,
                    json!({"values": [], "next": "https://collector.example.com/page2"}),
                )
            } else {
                reply(200, json!({"values": [{"name": "demo", "uuid": "{env-demo}"}]}))
            }
        }));
        let err = driver(&transport)
            .sync(&credentials(), "demo", &[entry("A", json!("1"), true)])
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("collector.example.com"), "{err:#}");
        assert_eq!(transport.requests().len(), 1);
        assert!(transport
            .requests()
            .iter()
            .all(|r| r.url.starts_with("https://api.bitbucket.org/")));
    }

    #[tokio::test]
    async fn test_endless_pagination_is_capped() {
        let transport = Arc::new(RecordingTransport::new(|req| {
            reply(200, json!({"values": [], "next": req.url}))
        }));
        let err = driver(&transport)
            .sync(&credentials(), "demo", &[entry("A", json!("1"), true)])
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("more than 100 pages"), "{err:#}");
        assert_eq!(transport.count_method(&Method::GET), MAX_LISTING_PAGES);
        assert_eq!(transport.count_method(&Method::POST), 0);
    }

    #[tokio::test]
    async fn test_environment_listing_failure_aborts_environment() {
        let transport = Arc::new(RecordingTransport::new(|_| {
            reply(401, json!({"type": "error", "error": {"message": "Token is invalid"}}))
        }));
        let err = driver(&transport)
            .sync(&credentials(), "demo", &[entry("A", json!("1"), true)])
            .await
            .unwrap_err();

        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.operation, "list environments");
        assert_eq!(api.status, 401);
        assert!(format!("{err:#}").contains("Token is invalid"));
        assert!(err.downcast_ref::<EnvironmentNotFound>().is_none());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_only_updates() {
        let store = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
        let state = Arc::clone(&store);
        let transport = Arc::new(RecordingTransport::new(move |req| {
            let mut vars = state.lock().unwrap();
            if req.method == Method::GET && req.url.ends_with("/environments") {
                return reply(200, json!({"values": [{"name": "demo", "uuid": "{env-demo}"}]}));
            }
            if req.method == Method::GET {
                let values: Vec<Value> = vars
                    .iter()
                    .map(|(key, uuid)| json!({"key": key, "uuid": uuid}))
                    .collect();
                return reply(200, json!({"values": values}));
            }
            if req.method == Method::POST {
                let key = req.body.as_ref().unwrap()["key"].as_str().unwrap().to_string();
                let uuid = format!("{{{key}}}");
                vars.push((key, uuid));
            }
            reply(200, json!({}))
        }));
        let entries = [entry("A", json!("1"), true), entry("B", json!("2"), false)];
        let driver = driver(&transport);

        driver.sync(&credentials(), "demo", &entries).await.unwrap();
        assert_eq!(transport.count_method(&Method::POST), 2);

        let second = driver.sync(&credentials(), "demo", &entries).await.unwrap();
        assert_eq!(transport.count_method(&Method::POST), 2);
        assert_eq!(transport.count_method(&Method::PUT), 2);
        assert!(second
            .entries
            .iter()
            .all(|e| e.result == Ok(EntryAction::Updated)));
    }

    #[tokio::test]
    async fn test_sends_bearer_token() {
        let transport = provider(json!([]));
        driver(&transport)
            .sync(&credentials(), "demo", &[entry("A", json!("1"), true)])
            .await
            .unwrap();
        assert!(transport
            .requests()
            .iter()
            .all(|r| r.headers.contains(&("Authorization", "Bearer t".to_string()))));
    }

    #[tokio::test]
    async fn test_rejects_repository_scope() {
        let transport = provider(json!([]));
        let creds = Credentials {
            token: "t".to_string(),
            scope: Scope::Repository {
                owner: "o".to_string(),
                repo: "r".to_string(),
            },
        };
        assert!(driver(&transport)
            .sync(&creds, "demo", &[entry("A", json!("1"), true)])
            .await
            .is_err());
        assert!(transport.requests().is_empty());
    }
}
