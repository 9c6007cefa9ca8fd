//! In-memory `access_codes` table for tests.
//!
//! Every operation takes the table lock for its whole read-and-write, which
//! gives the row-level update isolation the claim pipeline relies on.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::transport::{ClaimRequest, StoreResponse, StoreTransport, TransportError};
use crate::util::id::now_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Procedure,
    Update,
    Select,
}

/// How the `claim_code` procedure behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Procedure {
    Deployed,
    /// Answers every call with this status and an empty body.
    Status(StatusCode),
    /// Never answers.
    Unreachable,
}

#[derive(Debug, Clone)]
struct Row {
    code: String,
    room: String,
    used_at: Option<String>,
}

impl Row {
    fn matches(&self, request: &ClaimRequest) -> bool {
        self.code == request.code && self.room == request.room
    }

    fn to_json(&self) -> Value {
        json!({ "code": self.code, "room": self.room, "used_at": self.used_at })
    }
}

pub struct MemoryStore {
    rows: Mutex<Vec<Row>>,
    procedure: Mutex<Procedure>,
    update_failure: Mutex<Option<String>>,
    select_failure: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            procedure: Mutex::new(Procedure::Deployed),
            update_failure: Mutex::new(None),
            select_failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_code(room: &str, code: &str) -> Self {
        let store = Self::new();
        store.insert(room, code);
        store
    }

    pub fn insert(&self, room: &str, code: &str) {
        self.rows.lock().push(Row { code: code.to_owned(), room: room.to_owned(), used_at: None });
    }

    pub fn set_procedure(&self, procedure: Procedure) {
        *self.procedure.lock() = procedure;
    }

    /// Make every conditional update fail at the transport level.
    pub fn fail_updates(&self, message: &str) {
        *self.update_failure.lock() = Some(message.to_owned());
    }

    /// Make every disambiguation read fail at the transport level.
    pub fn fail_selects(&self, message: &str) {
        *self.select_failure.lock() = Some(message.to_owned());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn is_claimed(&self, room: &str, code: &str) -> bool {
        self.rows
            .lock()
            .iter()
            .any(|r| r.room == room && r.code == code && r.used_at.is_some())
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl StoreTransport for MemoryStore {
    async fn call_claim_procedure(
        &self,
        request: &ClaimRequest,
    ) -> Result<StoreResponse, TransportError> {
        self.record(Call::Procedure);
        tokio::task::yield_now().await;
        let procedure = self.procedure.lock().clone();
        match procedure {
            Procedure::Unreachable => Err(TransportError::Request("connection refused".into())),
            Procedure::Status(status) => Ok(StoreResponse::new(status, "")),
            Procedure::Deployed => {
                let mut rows = self.rows.lock();
                let claimed = rows
                    .iter_mut()
                    .find(|r| r.matches(request) && r.used_at.is_none())
                    .map(|row| {
                        row.used_at = Some(now_timestamp());
                        row.to_json()
                    });
                Ok(StoreResponse::ok(claimed.unwrap_or(Value::Null).to_string()))
            }
        }
    }

    async fn update_unclaimed(
        &self,
        request: &ClaimRequest,
        used_at: &str,
    ) -> Result<StoreResponse, TransportError> {
        self.record(Call::Update);
        tokio::task::yield_now().await;
        if let Some(message) = self.update_failure.lock().clone() {
            return Err(TransportError::Request(message));
        }
        let mut rows = self.rows.lock();
        let updated: Vec<Value> = rows
            .iter_mut()
            .filter(|r| r.matches(request) && r.used_at.is_none())
            .map(|row| {
                row.used_at = Some(used_at.to_owned());
                row.to_json()
            })
            .collect();
        Ok(StoreResponse::ok(Value::Array(updated).to_string()))
    }

    async fn select_codes(&self, request: &ClaimRequest) -> Result<StoreResponse, TransportError> {
        self.record(Call::Select);
        tokio::task::yield_now().await;
        if let Some(message) = self.select_failure.lock().clone() {
            return Err(TransportError::Request(message));
        }
        let rows = self.rows.lock();
        let found: Vec<Value> = rows.iter().filter(|r| r.matches(request)).map(Row::to_json).collect();
        Ok(StoreResponse::ok(Value::Array(found).to_string()))
    }
}
