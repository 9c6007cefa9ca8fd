pub mod registry;
pub mod unlocks;
