//! # Desired-State Document
//!
//! Model and loader for `.repo-env.json`.
//!
//! The document is a flat JSON object. A handful of reserved keys carry the
//! platform discriminator and credentials; every other key holding an object is
//! an environment:
//!
//! ```json
//! {
//!   "platform": "github",
//!   "owner": "octo",
//!   "repo": "web",
//!   "token": "ghp_...",
//!   "staging": {
//!     "run": true,
//!     "variables": [
//!       { "key": "API_URL", "value": "https://x", "secured": false },
//!       { "key": "DB_PASS", "value": "hunter2" }
//!     ]
//!   }
//! }
//! ```

use crate::error::DocumentError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

const RESERVED_KEYS: [&str; 5] = ["platform", "token", "owner", "workspace", "repo"];

/// Hosting provider the whole document syncs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Github,
    Bitbucket,
}

impl Platform {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Bitbucket => "bitbucket",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Platform::Github),
            "bitbucket" => Ok(Platform::Bitbucket),
            other => Err(DocumentError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Where on the provider the entries live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// GitHub `owner/repo`
    Repository { owner: String, repo: String },
    /// Bitbucket `workspace/repo`
    Workspace { workspace: String, repo: String },
}

/// Provider credentials plus scoping. Read-only for the whole run.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub scope: Scope,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

impl Credentials {
    /// `Authorization` header value
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// One declared variable or secret
#[derive(Clone, Deserialize)]
pub struct EntrySpec {
    pub key: String,
    pub value: Value,
    #[serde(default = "default_secured")]
    pub secured: bool,
}

fn default_secured() -> bool {
    true
}

impl std::fmt::Debug for EntrySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("EntrySpec");
        s.field("key", &self.key);
        if self.secured {
            s.field("value", &"<redacted>");
        } else {
            s.field("value", &self.value);
        }
        s.field("secured", &self.secured).finish()
    }
}

impl EntrySpec {
    /// Text form of the value as it goes on the wire.
    ///
    /// Strings are sent verbatim, everything else as compact JSON in document order.
    #[must_use]
    pub fn text_value(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Per-environment desired state
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub run: bool,
    #[serde(default)]
    pub variables: Option<Vec<EntrySpec>>,
}

impl EnvironmentSpec {
    /// Only `run: true` with at least one entry is synced
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.run && self.variables.as_ref().is_some_and(|v| !v.is_empty())
    }

    #[must_use]
    pub fn entries(&self) -> &[EntrySpec] {
        self.variables.as_deref().unwrap_or_default()
    }
}

/// The parsed `.repo-env.json`
#[derive(Debug, Clone)]
pub struct DesiredStateDocument {
    pub platform: Platform,
    pub credentials: Credentials,
    /// Environments in document order
    pub environments: Vec<(String, EnvironmentSpec)>,
}

impl DesiredStateDocument {
    /// Read and validate the document at `path`
    ///
    /// # Errors
    /// Fails if the file is missing, unreadable, or fails validation.
    pub fn load(path: &Path, fallback_token: Option<&str>) -> Result<Self, DocumentError> {
        if !path.exists() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, fallback_token)
    }

    /// Parse and validate document text
    ///
    /// # Errors
    /// Fails on malformed JSON, unsupported platform, missing credentials,
    /// malformed environments or duplicate keys.
    pub fn parse(text: &str, fallback_token: Option<&str>) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value, fallback_token)
    }

    /// Validate an already-parsed JSON value
    ///
    /// # Errors
    /// See [`DesiredStateDocument::parse`].
    pub fn from_value(value: Value, fallback_token: Option<&str>) -> Result<Self, DocumentError> {
        let Value::Object(map) = value else {
            return Err(DocumentError::NotAnObject);
        };

        let platform: Platform = string_field(&map, "platform")
            .ok_or(DocumentError::MissingField("platform"))?
            .parse()?;

        let token = string_field(&map, "token")
            .or(fallback_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or(DocumentError::MissingField("token"))?
            .to_string();

        let repo = required(&map, "repo")?;
        let scope = match platform {
            Platform::Github => Scope::Repository {
                owner: required(&map, "owner")?,
                repo,
            },
            Platform::Bitbucket => Scope::Workspace {
                workspace: required(&map, "workspace")?,
                repo,
            },
        };

        let mut environments = Vec::new();
        for (name, value) in map {
            if RESERVED_KEYS.contains(&name.as_str()) || !value.is_object() {
                continue;
            }
            let invalid = |source| DocumentError::InvalidEnvironment {
                environment: name.clone(),
                source,
            };

            let run = match value.get("run") {
                Some(flag) if !flag.is_null() => {
                    serde_json::from_value::<bool>(flag.clone()).map_err(invalid)?
                }
                _ => false,
            };
            let declares_entries = match value.get("variables") {
                None | Some(Value::Null) => false,
                Some(Value::Array(entries)) => !entries.is_empty(),
                Some(_) => true,
            };

            // Entries of skipped environments are never read
            if !(run && declares_entries) {
                environments.push((name, EnvironmentSpec { run, variables: None }));
                continue;
            }

            let spec: EnvironmentSpec = serde_json::from_value(value).map_err(invalid)?;
            check_unique_keys(&name, &spec)?;
            environments.push((name, spec));
        }

        Ok(Self {
            platform,
            credentials: Credentials { token, scope },
            environments,
        })
    }

    /// Environments that will actually be synced, in document order
    pub fn runnable_environments(&self) -> impl Iterator<Item = (&str, &[EntrySpec])> {
        self.environments
            .iter()
            .filter(|(_, spec)| spec.is_runnable())
            .map(|(name, spec)| (name.as_str(), spec.entries()))
    }
}

fn string_field<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    map.get(field).and_then(Value::as_str)
}

fn required(map: &Map<String, Value>, field: &'static str) -> Result<String, DocumentError> {
    string_field(map, field)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(DocumentError::MissingField(field))
}

fn check_unique_keys(environment: &str, spec: &EnvironmentSpec) -> Result<(), DocumentError> {
    let mut seen = HashSet::new();
    for entry in spec.entries() {
        if !seen.insert(entry.key.as_str()) {
            return Err(DocumentError::DuplicateKey {
                environment: environment.to_string(),
                key: entry.key.clone(),
            });
        }
    }
    Ok(())
}
