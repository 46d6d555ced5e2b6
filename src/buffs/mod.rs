//! Buffs, debuffs and static modifiers

pub mod buff;
pub mod engine;
pub mod stats;

pub use buff::{Buff, BuffDuration, BuffKey, BuffSpec};
pub use engine::{ApplyOutcome, BaseStatsLookup, BuffEngine};
pub use stats::{StatBlock, StatKey};
