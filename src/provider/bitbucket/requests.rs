//! # Request Types
//!
//! Bitbucket Cloud deployment variable request body.
//!
//! API Reference: https://developer.atlassian.com/cloud/bitbucket/rest/api-group-deployments/

use serde::Serialize;

/// Body of both create (`POST .../variables`) and update (`PUT .../variables/{uuid}`).
///
/// `secured` asks Bitbucket to store the value write-only; the value itself
/// travels as plain text over TLS.
#[derive(Debug, Serialize)]
pub struct VariableRequest {
    pub key: String,
    pub value: String,
    pub secured: bool,
}
