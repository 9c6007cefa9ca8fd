//! Seam between the claim pipeline and the remote store.
//!
//! The pipeline only sees status codes and raw bodies; everything about URLs,
//! headers and the HTTP client lives behind [`StoreTransport`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// The `(code, room)` pair a claim is made for. Serialised as the body of the
/// `claim_code` procedure call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimRequest {
    pub code: String,
    pub room: String,
}

impl ClaimRequest {
    pub fn new(room: &str, code: &str) -> Self {
        Self { code: code.to_owned(), room: room.to_owned() }
    }
}

/// One row of the remote `access_codes` table as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessCodeRow {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub used_at: Option<String>,
}

/// Status and raw body of a completed store request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: StatusCode,
    pub body: String,
}

impl StoreResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    #[cfg(test)]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

/// A request that never produced a response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Request(String),
}

#[async_trait]
pub trait StoreTransport: Send + Sync {
    /// `claim_code(code, room)`: the atomic compare-and-swap procedure.
    async fn call_claim_procedure(
        &self,
        request: &ClaimRequest,
    ) -> Result<StoreResponse, TransportError>;

    /// Set `used_at` on rows matching `(code, room)` whose `used_at` is still
    /// null, returning the updated rows.
    async fn update_unclaimed(
        &self,
        request: &ClaimRequest,
        used_at: &str,
    ) -> Result<StoreResponse, TransportError>;

    /// Rows matching `(code, room)` regardless of `used_at`.
    async fn select_codes(&self, request: &ClaimRequest) -> Result<StoreResponse, TransportError>;
}
