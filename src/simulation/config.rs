//! Per-run configuration
//!
//! Everything that describes *one fight*: who is in the squad, who we
//! measure, what we shoot at and for how long. Combat rules shared by all
//! runs live in `SimulationConfig`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::buffs::StatBlock;
use crate::combat::damage::{CollectionBonus, EnemyProfile};
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::CharacterId;
use crate::data::{CharacterRoster, DistanceTier};

/// Squad slots
pub const SQUAD_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Simulated seconds per run
    pub duration: f64,

    /// Realtime pacing: simulated seconds per wall-clock second.
    /// None runs as fast as possible.
    pub speed: Option<f64>,

    /// Up to five slots; empty slots are allowed
    pub squad: Vec<Option<CharacterId>>,

    /// Slot whose damage is reported
    pub target_index: usize,

    pub distance: DistanceTier,
    pub enemy: EnemyProfile,

    /// Permanent stats for every squad member
    pub static_buffs: StatBlock,
    /// Permanent stats for individual characters (on top of `static_buffs`)
    pub character_buffs: BTreeMap<CharacterId, StatBlock>,
    /// Permanent debuffs on the enemy
    pub enemy_debuffs: StatBlock,

    pub collection: CollectionBonus,

    /// Independent runs in a batch
    pub runs: u32,
    /// Seed of the first run; run `i` uses `seed + i`
    pub seed: u64,

    /// Simulated seconds between progress snapshots
    pub snapshot_interval: f64,

    /// Keep the human-readable combat log
    pub record_log: bool,

    pub engine: SimulationConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration: 180.0,
            speed: None,
            squad: Vec::new(),
            target_index: 0,
            distance: DistanceTier::Mid,
            enemy: EnemyProfile::default(),
            static_buffs: StatBlock::new(),
            character_buffs: BTreeMap::new(),
            enemy_debuffs: StatBlock::new(),
            collection: CollectionBonus::default(),
            runs: 1,
            seed: 42,
            snapshot_interval: 1.0,
            record_log: true,
            engine: SimulationConfig::default(),
        }
    }
}

impl RunConfig {
    /// Squad from character ids in slot order
    pub fn with_squad(ids: &[&str]) -> Self {
        Self {
            squad: ids.iter().map(|id| Some(CharacterId::from(*id))).collect(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The character whose damage is reported
    pub fn target(&self) -> Option<&CharacterId> {
        self.squad.get(self.target_index).and_then(Option::as_ref)
    }

    /// Static stats for one squad member
    pub fn static_buffs_for(&self, character: &CharacterId) -> StatBlock {
        let mut total = self.static_buffs.clone();
        if let Some(extra) = self.character_buffs.get(character) {
            total.merge(extra);
        }
        total
    }

    /// Check the run can start.
    ///
    /// Squad members missing from the roster are tolerated (they are skipped
    /// with a warning when the run starts); a missing target is not.
    pub fn validate(&self, roster: &CharacterRoster) -> Result<()> {
        self.engine.validate()?;

        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(SimError::Config(format!(
                "duration must be positive (got {})",
                self.duration
            )));
        }
        if let Some(speed) = self.speed {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(SimError::Config(format!("speed must be positive (got {})", speed)));
            }
        }
        if !(self.snapshot_interval.is_finite() && self.snapshot_interval > 0.0) {
            return Err(SimError::Config("snapshot_interval must be positive".into()));
        }
        if self.runs == 0 {
            return Err(SimError::Config("runs must be at least 1".into()));
        }

        if self.squad.len() > SQUAD_SIZE {
            return Err(SimError::Config(format!(
                "squad has {} slots, at most {} allowed",
                self.squad.len(),
                SQUAD_SIZE
            )));
        }

        let mut seen = AHashSet::new();
        for id in self.squad.iter().flatten() {
            if !seen.insert(id) {
                return Err(SimError::Config(format!("{} appears twice in the squad", id)));
            }
        }

        let Some(target) = self.target() else {
            return Err(SimError::Config(format!(
                "target slot {} is empty or out of range",
                self.target_index
            )));
        };
        if !roster.contains(target) {
            return Err(SimError::UnknownCharacter(target.clone()));
        }

        for id in self.squad.iter().flatten() {
            if !roster.contains(id) {
                warn!(character = %id, "squad member has no definition and will sit out");
            }
        }

        if !(self.collection.damage_multiplier.is_finite() && self.collection.damage_multiplier >= 0.0) {
            return Err(SimError::Config("collection damage_multiplier must be non-negative".into()));
        }
        if self.enemy.defense < 0.0 {
            return Err(SimError::Config("enemy defense must be non-negative".into()));
        }

        Ok(())
    }
}
