//! One-time access code claims.
//!
//! A claim runs as a short pipeline of result-returning steps:
//!
//! 1. configuration gate (no transport, no claim),
//! 2. the `claim_code` procedure, which performs the compare-and-swap inside
//!    the store,
//! 3. when the procedure is missing or unreachable, a conditional update of
//!    `access_codes` restricted to `used_at is null`,
//! 4. when that update touches no row, a read to tell `used` from `invalid`.
//!
//! Each step's classification is a pure function of the transport's answer so
//! it can be checked without a network.

pub mod rest;
pub mod transport;

#[cfg(test)]
pub mod memory;

use std::sync::Arc;

use reqwest::StatusCode;
use serde::{ser::SerializeStruct, Serialize, Serializer};
use serde_json::Value;

use crate::util::id::now_timestamp;
pub use transport::{AccessCodeRow, ClaimRequest, StoreResponse, StoreTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    /// Code unknown for this room.
    Invalid,
    /// Code exists but was already claimed.
    Used,
    /// Store not configured or credential rejected.
    Config,
    /// Transport failure.
    Network,
    /// Unclassified store response.
    Unknown,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Invalid => "invalid",
            FailureReason::Used => "used",
            FailureReason::Config => "config",
            FailureReason::Network => "network",
            FailureReason::Unknown => "unknown",
        }
    }
}

/// Outcome of one claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimResult {
    Success { code: String, room: String, used_at: String },
    Failure { reason: FailureReason, message: Option<String> },
}

impl ClaimResult {
    fn success(row: AccessCodeRow, fallback_used_at: impl FnOnce() -> String) -> Self {
        ClaimResult::Success {
            code: row.code,
            room: row.room,
            used_at: row.used_at.unwrap_or_else(fallback_used_at),
        }
    }

    pub fn failure(reason: FailureReason, message: impl Into<String>) -> Self {
        ClaimResult::Failure { reason, message: Some(message.into()) }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ClaimResult::Success { .. })
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            ClaimResult::Success { .. } => None,
            ClaimResult::Failure { reason, .. } => Some(*reason),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ClaimResult::Success { .. } => None,
            ClaimResult::Failure { message, .. } => message.as_deref(),
        }
    }
}

/// `{"ok": true, code, room, used_at}` or `{"ok": false, reason, message?}`.
impl Serialize for ClaimResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClaimResult::Success { code, room, used_at } => {
                let mut s = serializer.serialize_struct("ClaimResult", 4)?;
                s.serialize_field("ok", &true)?;
                s.serialize_field("code", code)?;
                s.serialize_field("room", room)?;
                s.serialize_field("used_at", used_at)?;
                s.end()
            }
            ClaimResult::Failure { reason, message } => {
                let mut s = serializer.serialize_struct("ClaimResult", 3)?;
                s.serialize_field("ok", &false)?;
                s.serialize_field("reason", reason)?;
                match message {
                    Some(m) => s.serialize_field("message", m)?,
                    None => s.skip_field("message")?,
                }
                s.end()
            }
        }
    }
}

/// Result of the procedure step.
#[derive(Debug, PartialEq, Eq)]
enum Primary {
    Settled(ClaimResult),
    /// Procedure missing, rejected the call shape, or unreachable.
    Unavailable,
}

/// Result of the conditional update step.
#[derive(Debug, PartialEq, Eq)]
enum Update {
    Claimed(AccessCodeRow),
    NoMatch,
    Failed(ClaimResult),
}

fn classify_procedure(answer: Result<StoreResponse, TransportError>) -> Primary {
    let response = match answer {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%error, "claim procedure unreachable, using conditional update");
            return Primary::Unavailable;
        }
    };
    let status = response.status;
    if status.is_success() {
        return Primary::Settled(match procedure_row(&response.body) {
            Some(row) => ClaimResult::success(row, now_timestamp),
            None => ClaimResult::failure(FailureReason::Invalid, "Code not found or already used"),
        });
    }
    match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => {
            tracing::debug!(%status, "claim procedure not available");
            Primary::Unavailable
        }
        StatusCode::CONFLICT => {
            Primary::Settled(ClaimResult::failure(FailureReason::Used, "Code already used"))
        }
        StatusCode::UNAUTHORIZED => {
            Primary::Settled(ClaimResult::failure(FailureReason::Config, "Invalid store credential"))
        }
        _ => Primary::Settled(ClaimResult::failure(FailureReason::Unknown, response.body)),
    }
}

/// The procedure answers with an object, a one-element list, or nothing.
fn procedure_row(body: &str) -> Option<AccessCodeRow> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidate = match value {
        Value::Array(items) => items.into_iter().next()?,
        other => other,
    };
    let row: AccessCodeRow = serde_json::from_value(candidate).ok()?;
    (!row.code.is_empty() && !row.room.is_empty()).then_some(row)
}

fn classify_update(answer: Result<StoreResponse, TransportError>) -> Update {
    let response = match answer {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%error, "conditional update failed");
            return Update::Failed(ClaimResult::failure(FailureReason::Network, error.to_string()));
        }
    };
    let status = response.status;
    if status == StatusCode::UNAUTHORIZED {
        return Update::Failed(ClaimResult::failure(FailureReason::Config, "Invalid store credential"));
    }
    if !status.is_success() {
        return Update::Failed(ClaimResult::failure(
            FailureReason::Unknown,
            format!("HTTP {}", status.as_u16()),
        ));
    }
    // A body that is not JSON at all is a broken response, not a store answer.
    let value = match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, "conditional update returned invalid JSON");
            return Update::Failed(ClaimResult::failure(
                FailureReason::Network,
                format!("invalid JSON response: {error}"),
            ));
        }
    };
    let rows = match serde_json::from_value::<Vec<AccessCodeRow>>(value) {
        Ok(rows) => rows,
        Err(_) => return Update::Failed(ClaimResult::failure(FailureReason::Unknown, response.body)),
    };
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (None, _) => Update::NoMatch,
        (Some(row), None) => Update::Claimed(row),
        // More than one row for a (code, room) pair.
        _ => Update::Failed(ClaimResult::failure(FailureReason::Unknown, response.body)),
    }
}

/// Any row for `(code, room)` means the code exists and somebody else holds
/// it. A rejected or undecodable read reports `invalid`; a read that never
/// got an answer reports `network`.
fn classify_lookup(answer: Result<StoreResponse, TransportError>) -> ClaimResult {
    let exists = match answer {
        Ok(response) if response.status.is_success() => {
            matches!(serde_json::from_str::<Value>(&response.body), Ok(Value::Array(rows)) if !rows.is_empty())
        }
        Ok(response) => {
            tracing::debug!(status = %response.status, "code lookup rejected");
            false
        }
        Err(error) => {
            tracing::warn!(%error, "code lookup failed");
            return ClaimResult::failure(FailureReason::Network, error.to_string());
        }
    };
    if exists {
        ClaimResult::failure(FailureReason::Used, "Already used")
    } else {
        ClaimResult::failure(FailureReason::Invalid, "Invalid code")
    }
}

/// Claims access codes against the remote store. Without a transport every
/// claim fails with [`FailureReason::Config`].
#[derive(Clone, Default)]
pub struct ClaimOrchestrator {
    transport: Option<Arc<dyn StoreTransport>>,
}

impl ClaimOrchestrator {
    pub fn new(transport: Option<Arc<dyn StoreTransport>>) -> Self {
        Self { transport }
    }

    pub async fn claim(&self, room: &str, code: &str) -> ClaimResult {
        let Some(transport) = self.transport.as_deref() else {
            tracing::warn!(%room, "claim rejected: store not configured");
            return ClaimResult::failure(FailureReason::Config, "Missing store config");
        };
        let request = ClaimRequest::new(room, code);

        let result = match classify_procedure(transport.call_claim_procedure(&request).await) {
            Primary::Settled(result) => {
                tracing::debug!(%room, "claim settled by procedure");
                result
            }
            Primary::Unavailable => fallback(transport, &request).await,
        };

        match &result {
            ClaimResult::Success { used_at, .. } => tracing::info!(%room, %used_at, "code claimed"),
            ClaimResult::Failure { reason, .. } => {
                tracing::info!(%room, reason = reason.as_str(), "claim refused")
            }
        }
        result
    }
}

async fn fallback(transport: &dyn StoreTransport, request: &ClaimRequest) -> ClaimResult {
    let used_at = now_timestamp();
    match classify_update(transport.update_unclaimed(request, &used_at).await) {
        Update::Claimed(row) => {
            tracing::debug!(room = %request.room, "claim settled by conditional update");
            ClaimResult::success(row, || used_at)
        }
        Update::NoMatch => classify_lookup(transport.select_codes(request).await),
        Update::Failed(result) => result,
    }
}
