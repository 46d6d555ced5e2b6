//! Combat model: damage pipeline, hit rolls, per-character state and the
//! attack/reload/burst flow

pub mod damage;
pub mod resolver;
pub mod rolls;
pub mod state;

pub use damage::{
    compose_damage, resolve_damage, round_damage, CollectionBonus, CoreSize, DamageInput,
    EnemyProfile, HitFlags,
};
pub use resolver::{CombatResolver, ShotOutcome};
pub use rolls::{FixedRolls, RollSource, SeededRolls};
pub use state::{counters, AttackOverride, BurstTracker, CharacterCombatState, CombatPhase};
