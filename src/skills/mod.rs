//! Skills: declarative triggers and the effects they fire
//!
//! Definitions are plain data loaded with a character. The trigger engine
//! decides when a skill fires; `effects` applies it through a `SkillHost`.

pub mod definitions;
pub mod effects;
pub mod triggers;

pub use definitions::{Condition, Effect, Scope, SkillDefinition, TargetMode, TriggerRule};
pub use effects::{apply_activation, apply_state_exit, resolve_targets, SkillHost};
pub use triggers::{
    evaluate, Activation, ActivationSource, ConditionProbe, PollResult, StateExit, TriggerEngine,
};
