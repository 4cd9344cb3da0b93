//! # Response Types
//!
//! GitHub REST API response bodies read by the driver.

use serde::Deserialize;

/// Response of `GET /repos/{owner}/{repo}/environments/{env}/secrets/public-key`
#[derive(Debug, Deserialize)]
pub struct PublicKeyResponse {
    /// Identifier to echo back with values sealed under this key
    pub key_id: String,
    /// Base64 X25519 public key
    pub key: String,
}
