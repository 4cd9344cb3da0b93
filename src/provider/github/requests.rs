//! # Request Types
//!
//! GitHub REST API request bodies for environment secrets and variables.
//!
//! API Reference: https://docs.github.com/en/rest/actions/secrets and
//! https://docs.github.com/en/rest/actions/variables

use serde::Serialize;

/// Body of `PUT /repos/{owner}/{repo}/environments/{env}/secrets/{name}`
#[derive(Debug, Serialize)]
pub struct PutSecretRequest {
    /// Base64 sealed box of the value
    pub encrypted_value: String,
    /// Id of the public key the value was sealed with
    pub key_id: String,
}

/// Body of both `POST .../variables` and `PATCH .../variables/{name}`
#[derive(Debug, Serialize)]
pub struct VariableRequest {
    pub name: String,
    pub value: String,
}
