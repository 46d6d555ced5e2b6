//! Squad DPS - Event-Driven Squad Damage Simulation
//!
//! Five characters fire at a shared enemy while a discrete-event core
//! schedules attacks, reloads and burst rotations. Skills react to combat
//! events through triggers and shape the fight through timed buffs.

pub mod buffs;
pub mod combat;
pub mod core;
pub mod data;
pub mod events;
pub mod simulation;
pub mod skills;
