//! Static character definitions
//!
//! Loaded once from TOML and shared read-only by every run.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{BurstPosition, CharacterId};
use crate::skills::SkillDefinition;

/// Engagement distance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceTier {
    Near,
    #[default]
    Mid,
    Far,
}

/// Weapon class, which drives optimal distance and the shot model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponClass {
    /// Assault rifle
    AR,
    /// Submachine gun
    SMG,
    /// Shotgun: damage is reported per shot, averaged over pellets
    SG,
    /// Sniper rifle (charge)
    SR,
    /// Rocket launcher (charge)
    RL,
    /// Machine gun
    MG,
}

impl WeaponClass {
    /// Distance tier where this class gets the optimal-distance bonus
    pub fn optimal_distance(self) -> DistanceTier {
        match self {
            WeaponClass::SG | WeaponClass::SMG => DistanceTier::Near,
            WeaponClass::AR | WeaponClass::MG => DistanceTier::Mid,
            WeaponClass::SR | WeaponClass::RL => DistanceTier::Far,
        }
    }

    pub fn is_charge(self) -> bool {
        matches!(self, WeaponClass::SR | WeaponClass::RL)
    }

    pub fn is_shotgun(self) -> bool {
        matches!(self, WeaponClass::SG)
    }
}

/// Unbuffed combat stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStats {
    pub attack: f64,
    /// Damage multiplier of a normal shot
    pub weapon_coefficient: f64,
    pub ammo: u32,
    #[serde(default = "default_pellets")]
    pub pellets: u32,
    /// Seconds between shots (includes charge time for charge weapons)
    pub attack_interval: f64,
    pub reload_time: f64,
    /// Full-charge multiplier, charge weapons only
    #[serde(default)]
    pub charge_coefficient: Option<f64>,
    #[serde(default)]
    pub piercing: bool,
}

fn default_pellets() -> u32 {
    1
}

/// A character as described by static data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDefinition {
    pub id: CharacterId,
    pub name: String,
    pub weapon: WeaponClass,
    #[serde(default)]
    pub burst_position: Option<BurstPosition>,
    /// Seconds before this character can burst again
    #[serde(default)]
    pub burst_cooldown: f64,
    pub stats: BaseStats,
    #[serde(default)]
    pub skills: Vec<SkillDefinition>,
}

impl CharacterDefinition {
    /// Minimal definition for tests and tools: no skills, no burst
    pub fn basic(id: &str, weapon: WeaponClass, stats: BaseStats) -> Self {
        Self {
            id: CharacterId::new(id),
            name: id.to_string(),
            weapon,
            burst_position: None,
            burst_cooldown: 0.0,
            stats,
            skills: Vec::new(),
        }
    }

    /// Charge multiplier used by the damage pipeline
    pub fn charge_coefficient(&self) -> Option<f64> {
        if self.weapon.is_charge() {
            Some(self.stats.charge_coefficient.unwrap_or(1.0))
        } else {
            None
        }
    }

    /// Check the numbers make sense before the definition is used
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| SimError::CharacterData {
            source_name: self.id.to_string(),
            message,
        };

        if self.stats.attack < 0.0 || !self.stats.attack.is_finite() {
            return Err(fail(format!("attack must be non-negative (got {})", self.stats.attack)));
        }
        if self.stats.ammo == 0 {
            return Err(fail("ammo capacity must be at least 1".into()));
        }
        if self.stats.pellets == 0 {
            return Err(fail("pellets must be at least 1".into()));
        }
        if !(self.stats.attack_interval > 0.0) {
            return Err(fail("attack_interval must be positive".into()));
        }
        if self.stats.reload_time < 0.0 {
            return Err(fail("reload_time must be non-negative".into()));
        }
        if self.burst_cooldown < 0.0 {
            return Err(fail("burst_cooldown must be non-negative".into()));
        }
        Ok(())
    }
}
