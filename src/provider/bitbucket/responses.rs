//! # Response Types
//!
//! Bitbucket Cloud listing responses read during discovery.

use serde::Deserialize;

/// One page of a Bitbucket collection
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    /// Absolute URL of the next page, absent on the last one
    #[serde(default)]
    pub next: Option<String>,
}

/// Entry of `GET /repositories/{workspace}/{repo}/environments`
#[derive(Debug, Deserialize)]
pub struct Environment {
    pub name: String,
    pub uuid: String,
}

/// Entry of `GET .../deployments_config/environments/{uuid}/variables`
#[derive(Debug, Deserialize)]
pub struct Variable {
    pub key: String,
    pub uuid: String,
}
