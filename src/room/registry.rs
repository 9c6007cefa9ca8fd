//! Catalogue of escape rooms and their lock flags.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomDef {
    /// URL slug, e.g. `christmas-room`.
    pub id: &'static str,
    /// Dictionary key prefix under `routes.*`, e.g. `christmasRoom`.
    pub base_key: &'static str,
    /// Public path to a picture of the board game the room needs.
    pub board_game_image: Option<&'static str>,
}

pub const ROOMS: &[RoomDef] = &[RoomDef {
    id: "christmas-room",
    base_key: "christmasRoom",
    board_game_image: Some("/assets/boardgame-placeholder.svg"),
}];

pub fn get_room(id: &str) -> Option<&'static RoomDef> {
    ROOMS.iter().find(|r| r.id == id)
}

/// `christmas-room` -> `CHRISTMAS_ROOM`
pub fn env_name_for(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Present-but-blank counts as locked.
fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    v.is_empty() || matches!(v.as_str(), "1" | "true" | "yes" | "on")
}

/// Whether a room requires an access code.
///
/// A set `LOCK_<ROOM>` decides alone, even when blank; otherwise a set
/// `LOCK_DEFAULT` decides; rooms are locked when neither is set.
pub fn lock_for_room(id: &str, env: impl Fn(&str) -> Option<String>) -> bool {
    env(&format!("LOCK_{}", env_name_for(id)))
        .or_else(|| env("LOCK_DEFAULT"))
        .map_or(true, |raw| parse_flag(&raw))
}

/// [`lock_for_room`] against the process environment.
pub fn lock_from_env(id: &str) -> bool {
    lock_for_room(id, |key| std::env::var(key).ok())
}
