//! Mutable per-character combat state for one run

use ahash::AHashMap;
use serde::Serialize;

use crate::core::types::{CharacterId, EventId, SimTime};
use crate::data::CharacterDefinition;

/// Built-in counter names, usable by accumulator triggers
pub mod counters {
    pub const SHOTS_FIRED: &str = "shots_fired";
    pub const PELLETS_FIRED: &str = "pellets_fired";
    pub const CRITS: &str = "crits";
    pub const CORE_HITS: &str = "core_hits";
    pub const RELOADS: &str = "reloads";
    pub const BURSTS: &str = "bursts";
    pub const DAMAGE_DEALT: &str = "damage_dealt";
}

/// Attack override installed by a skill
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttackOverride {
    pub coefficient: f64,
    /// None lasts until replaced
    pub shots_left: Option<u32>,
    pub pellets: Option<u32>,
}

/// Where a character is in its fire/reload loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    Firing,
    Reloading,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterCombatState {
    pub character: CharacterId,
    pub current_ammo: u32,
    pub max_ammo: u32,
    pub phase: CombatPhase,

    pub shots_fired: u64,
    pub pellets_fired: u64,
    pub crit_pellets: u64,
    pub core_pellets: u64,
    pub reloads: u32,
    pub bursts: u32,

    pub shot_damage: u64,
    pub skill_damage: u64,
    pub healing_done: f64,

    /// Earliest time this character may burst again
    pub burst_ready_at: SimTime,
    pub used_burst_this_cycle: bool,

    pub attack_override: Option<AttackOverride>,

    #[serde(skip)]
    pub counters: AHashMap<String, f64>,
}

impl CharacterCombatState {
    pub fn new(definition: &CharacterDefinition) -> Self {
        Self {
            character: definition.id.clone(),
            current_ammo: definition.stats.ammo,
            max_ammo: definition.stats.ammo,
            phase: CombatPhase::Firing,
            shots_fired: 0,
            pellets_fired: 0,
            crit_pellets: 0,
            core_pellets: 0,
            reloads: 0,
            bursts: 0,
            shot_damage: 0,
            skill_damage: 0,
            healing_done: 0.0,
            burst_ready_at: 0.0,
            used_burst_this_cycle: false,
            attack_override: None,
            counters: AHashMap::new(),
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.phase == CombatPhase::Reloading
    }

    pub fn total_damage(&self) -> u64 {
        self.shot_damage + self.skill_damage
    }

    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }

    pub fn bump(&mut self, name: &str, delta: f64) {
        *self.counters.entry(name.to_string()).or_insert(0.0) += delta;
    }

    pub fn reset_counter(&mut self, name: &str) {
        self.counters.insert(name.to_string(), 0.0);
    }

    pub fn ammo_fraction(&self) -> f64 {
        if self.max_ammo == 0 {
            return 0.0;
        }
        self.current_ammo as f64 / self.max_ammo as f64
    }

    pub fn crit_rate(&self) -> f64 {
        ratio(self.crit_pellets, self.pellets_fired)
    }

    pub fn core_hit_rate(&self) -> f64 {
        ratio(self.core_pellets, self.pellets_fired)
    }

    /// Coefficient and pellet count for the next shot, consuming one
    /// shot of any attack override
    pub fn take_shot_profile(&mut self, definition: &CharacterDefinition) -> (f64, u32) {
        let Some(over) = self.attack_override.as_mut() else {
            return (definition.stats.weapon_coefficient, definition.stats.pellets);
        };

        let profile = (over.coefficient, over.pellets.unwrap_or(definition.stats.pellets));
        if let Some(left) = over.shots_left.as_mut() {
            *left = left.saturating_sub(1);
            if *left == 0 {
                self.attack_override = None;
            }
        }
        profile
    }
}

/// Squad-wide burst cycle state
#[derive(Debug, Clone, Default)]
pub struct BurstTracker {
    pub full_burst: bool,
    pub full_bursts: u32,
    /// Pending end of the current full burst
    pub full_burst_end: Option<EventId>,
    pub cycles: u32,
    /// Pending burst-ready event, so burst charge can pull it forward
    pub next_ready: Option<(EventId, SimTime)>,
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
