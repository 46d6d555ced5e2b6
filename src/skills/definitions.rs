//! Skill, trigger and effect definitions
//!
//! Everything here is static character data. Triggers and effects are
//! closed sum types so a new kind has to be handled everywhere it matters.

use serde::{Deserialize, Serialize};

use crate::buffs::{BuffSpec, StatBlock};
use crate::core::types::BuffId;
use crate::events::EventKind;

/// Which events an event trigger listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only events whose subject is the skill owner
    #[default]
    #[serde(rename = "self")]
    Owner,
    /// Events from anyone (including squad-wide events)
    Any,
}

/// Named conditions for periodic and state triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Always,
    FullBurstActive,
    NotFullBurst,
    Reloading,
    NotReloading,
    /// Owner's ammo is at or below this fraction of max
    AmmoAtMost { fraction: f64 },
    /// Owner's ammo is at or above this fraction of max
    AmmoAtLeast { fraction: f64 },
    CounterAtLeast { counter: String, value: f64 },
    /// A buff with this id is active on the owner
    BuffActive { buff: BuffId },
}

/// When a skill fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerRule {
    /// Fires on a named combat event
    Event {
        event: EventKind,
        #[serde(default)]
        scope: Scope,
    },
    /// Fires once when a counter goes from below to at-or-above threshold
    Accumulator {
        counter: String,
        threshold: f64,
        #[serde(default)]
        reset: bool,
    },
    /// Fires every `interval` seconds while the condition holds
    Periodic {
        interval: f64,
        #[serde(default)]
        condition: Option<Condition>,
    },
    /// Continuous condition checked every tick; entering fires the effects,
    /// leaving removes the conditional buffs they applied
    State { condition: Condition },
}

/// Who an effect lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    #[default]
    #[serde(rename = "self")]
    Owner,
    AllAllies,
    /// Squad members that used burst in the current cycle
    BurstUsers,
    /// Squad members that did not use burst in the current cycle
    NonBurstUsers,
    Enemy,
}

/// What a skill does when it fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    ApplyBuff {
        #[serde(default)]
        target: TargetMode,
        buff: BuffSpec,
    },
    ApplyStacks {
        #[serde(default)]
        target: TargetMode,
        buff: BuffSpec,
        stacks: u32,
    },
    /// Override the owner's next shots with a different coefficient
    ReplaceAttack {
        coefficient: f64,
        #[serde(default)]
        shots: Option<u32>,
        #[serde(default)]
        pellets: Option<u32>,
    },
    /// One skill hit on the enemy, `coefficient` × attack
    InstantDamage {
        coefficient: f64,
        #[serde(default)]
        ignore_defense: bool,
        #[serde(default)]
        dot: bool,
    },
    MultiHitDamage {
        coefficient: f64,
        hits: u32,
        #[serde(default)]
        ignore_defense: bool,
        #[serde(default)]
        dot: bool,
    },
    /// Heal for a fraction of the caster's attack
    Heal {
        #[serde(default)]
        target: TargetMode,
        fraction: f64,
    },
    /// Bring the next burst cycle forward by a fraction of the cycle length
    BurstCharge { amount: f64 },
    /// Refill ammo by a flat count and/or a fraction of max ammo
    AmmoCharge {
        #[serde(default)]
        target: TargetMode,
        #[serde(default)]
        rounds: u32,
        #[serde(default)]
        fraction: f64,
    },
    BurstCooldownReduction {
        #[serde(default)]
        target: TargetMode,
        seconds: f64,
    },
    TransformBuff {
        #[serde(default)]
        target: TargetMode,
        from: BuffId,
        to: BuffId,
        #[serde(default)]
        stats: Option<StatBlock>,
    },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::ApplyBuff { .. } => "apply_buff",
            Effect::ApplyStacks { .. } => "apply_stacks",
            Effect::ReplaceAttack { .. } => "replace_attack",
            Effect::InstantDamage { .. } => "instant_damage",
            Effect::MultiHitDamage { .. } => "multi_hit_damage",
            Effect::Heal { .. } => "heal",
            Effect::BurstCharge { .. } => "burst_charge",
            Effect::AmmoCharge { .. } => "ammo_charge",
            Effect::BurstCooldownReduction { .. } => "burst_cooldown_reduction",
            Effect::TransformBuff { .. } => "transform_buff",
        }
    }
}

/// A named skill: triggers plus the effects they fire, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub name: String,
    pub triggers: Vec<TriggerRule>,
    pub effects: Vec<Effect>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffs::{BuffDuration, StatKey};

    #[test]
    fn test_skill_parses_from_toml() {
        let text = r#"
            name = "Focus Fire"

            [[triggers]]
            type = "event"
            event = "shot_fired"

            [[triggers]]
            type = "accumulator"
            counter = "shots_fired"
            threshold = 10
            reset = true

            [[effects]]
            type = "apply_buff"
            target = "all_allies"

            [effects.buff]
            id = "focus"
            duration = { type = "time", seconds = 5 }
            stats = { attack_percent = 0.2 }
        "#;

        let skill: SkillDefinition = toml::from_str(text).unwrap();
        assert_eq!(skill.triggers.len(), 2);
        assert_eq!(
            skill.triggers[0],
            TriggerRule::Event {
                event: EventKind::ShotFired,
                scope: Scope::Owner
            }
        );

        match &skill.effects[0] {
            Effect::ApplyBuff { target, buff } => {
                assert_eq!(*target, TargetMode::AllAllies);
                assert_eq!(buff.duration, BuffDuration::Time { seconds: 5.0 });
                assert_eq!(buff.stats.get(StatKey::AttackPercent), 0.2);
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_scope_self_spelling() {
        let scope: Scope = serde_json::from_str("\"self\"").unwrap();
        assert_eq!(scope, Scope::Owner);
    }
}
