//! HTTP routes: room catalogue, room access, code unlock, health.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::claim::{ClaimOrchestrator, ClaimResult};
use crate::i18n::{self, Lang};
use crate::room::registry::{self, RoomDef};
use crate::room::unlocks::UnlockLedger;
use crate::util::id::new_visitor_id;

#[derive(Clone)]
pub struct AppState {
    pub claims: ClaimOrchestrator,
    pub unlocks: Arc<UnlockLedger>,
    /// Lock flag per room id, resolved once at startup.
    pub locks: Arc<HashMap<&'static str, bool>>,
}

impl AppState {
    pub fn new(claims: ClaimOrchestrator, lock_for: impl Fn(&str) -> bool) -> Self {
        let locks = registry::ROOMS.iter().map(|r| (r.id, lock_for(r.id))).collect();
        Self { claims, unlocks: Arc::new(UnlockLedger::new()), locks: Arc::new(locks) }
    }

    fn is_locked(&self, room: &str) -> bool {
        self.locks.get(room).copied().unwrap_or(true)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RouteError {
    #[error("room not found")]
    RoomNotFound,
    #[error("access code required")]
    EmptyCode,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = match self {
            RouteError::RoomNotFound => StatusCode::NOT_FOUND,
            RouteError::EmptyCode => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/:room/access", get(room_access))
        .route("/api/rooms/:room/unlock", post(unlock_room))
        .with_state(state)
}

async fn healthz() -> &'static str { "ok" }

#[derive(Serialize)]
pub struct RoomSummary {
    #[serde(flatten)]
    pub room: RoomDef,
    pub locked: bool,
}

pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let rooms = registry::ROOMS
        .iter()
        .map(|r| RoomSummary { room: *r, locked: state.is_locked(r.id) })
        .collect();
    Json(rooms)
}

#[derive(Deserialize)]
pub struct AccessQuery {
    pub visitor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomAccess {
    pub room: String,
    pub locked: bool,
    pub unlocked: bool,
}

pub async fn room_access(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Query(AccessQuery { visitor }): Query<AccessQuery>,
) -> Result<Json<RoomAccess>, RouteError> {
    let def = registry::get_room(&room).ok_or(RouteError::RoomNotFound)?;
    let locked = state.is_locked(def.id);
    let unlocked = !locked
        || visitor.is_some_and(|v| state.unlocks.is_unlocked(&v, def.id));
    Ok(Json(RoomAccess { room: def.id.to_owned(), locked, unlocked }))
}

#[derive(Deserialize)]
pub struct UnlockRequest {
    pub code: String,
    #[serde(default)]
    pub visitor: Option<String>,
    #[serde(default)]
    pub lang: Option<Lang>,
}

#[derive(Serialize)]
pub struct UnlockResponse {
    pub result: ClaimResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor: Option<String>,
    /// Localized message for a failed claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Claims `code` for the room. A refused claim is still a `200`; the
/// frontend reads `result.ok`.
pub async fn unlock_room(
    Path(room): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UnlockRequest>,
) -> Result<Json<UnlockResponse>, RouteError> {
    let def = registry::get_room(&room).ok_or(RouteError::RoomNotFound)?;
    let code = req.code.trim();
    if code.is_empty() {
        return Err(RouteError::EmptyCode);
    }
    let lang = req.lang.unwrap_or_else(|| {
        Lang::detect(headers.get(header::ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()))
    });

    let result = state.claims.claim(def.id, code).await;
    let response = if result.is_success() {
        let visitor = req
            .visitor
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(new_visitor_id);
        state.unlocks.mark_unlocked(&visitor, def.id);
        UnlockResponse { result, visitor: Some(visitor), error: None }
    } else {
        let error = result
            .reason()
            .map(|reason| i18n::unlock_error(lang, reason, result.message()));
        UnlockResponse { result, visitor: req.visitor, error }
    };
    Ok(Json(response))
}
