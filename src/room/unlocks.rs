//! "Room unlocked" markers recorded after a successful claim.

use dashmap::DashSet;

#[derive(Default)]
pub struct UnlockLedger {
    unlocked: DashSet<(String, String)>,
}

impl UnlockLedger {
    pub fn new() -> Self { Self { unlocked: DashSet::new() } }

    pub fn mark_unlocked(&self, visitor: &str, room: &str) {
        self.unlocked.insert((visitor.to_owned(), room.to_owned()));
    }

    pub fn is_unlocked(&self, visitor: &str, room: &str) -> bool {
        self.unlocked.contains(&(visitor.to_owned(), room.to_owned()))
    }
}
