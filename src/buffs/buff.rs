//! Buff definitions and live buff instances

use serde::{Deserialize, Serialize};

use crate::buffs::stats::StatBlock;
use crate::core::types::{BuffId, CharacterId, SimTime, TargetId};

/// How long a buff lives
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuffDuration {
    /// Until the run ends
    Permanent,
    /// Fixed number of seconds from the (last) application
    Time { seconds: f64 },
    /// Counts down once per shot fired by the target
    Shots { count: u32 },
    /// No end of its own; removed when its condition stops holding
    Conditional,
}

/// A buff as written in character data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffSpec {
    pub id: BuffId,
    pub stats: StatBlock,
    pub duration: BuffDuration,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
}

fn default_max_stacks() -> u32 {
    1
}

impl BuffSpec {
    pub fn new(id: impl Into<String>, stats: StatBlock, duration: BuffDuration) -> Self {
        Self {
            id: BuffId::new(id),
            stats,
            duration,
            stackable: false,
            max_stacks: 1,
        }
    }

    pub fn stacking(mut self, max_stacks: u32) -> Self {
        self.stackable = true;
        self.max_stacks = max_stacks.max(1);
        self
    }
}

/// Buffs are unique per (source, id) on a given target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuffKey {
    pub source: CharacterId,
    pub id: BuffId,
}

impl BuffKey {
    pub fn new(source: CharacterId, id: BuffId) -> Self {
        Self { source, id }
    }
}

/// A buff currently applied to a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    pub id: BuffId,
    pub source: CharacterId,
    pub target: TargetId,
    /// Per-stack values
    pub stats: StatBlock,
    pub duration: BuffDuration,
    pub start_time: SimTime,
    pub stackable: bool,
    pub max_stacks: u32,
    pub current_stacks: u32,
    /// Remaining shots for shot-limited buffs
    pub shots_remaining: Option<u32>,
}

impl Buff {
    pub fn from_spec(spec: &BuffSpec, target: TargetId, source: CharacterId, now: SimTime) -> Self {
        let shots_remaining = match spec.duration {
            BuffDuration::Shots { count } => Some(count),
            _ => None,
        };
        Self {
            id: spec.id.clone(),
            source,
            target,
            stats: spec.stats.clone(),
            duration: spec.duration,
            start_time: now,
            stackable: spec.stackable,
            max_stacks: spec.max_stacks.max(1),
            current_stacks: 1,
            shots_remaining,
        }
    }

    pub fn key(&self) -> BuffKey {
        BuffKey::new(self.source.clone(), self.id.clone())
    }

    /// End time for time-limited buffs
    pub fn end_time(&self) -> Option<SimTime> {
        match self.duration {
            BuffDuration::Time { seconds } => Some(self.start_time + seconds),
            _ => None,
        }
    }

    /// Does this buff contribute at `now`? Inclusive of the end instant.
    pub fn is_active_at(&self, now: SimTime) -> bool {
        match self.end_time() {
            Some(end) => now >= self.start_time && now <= end,
            None => self.shots_remaining != Some(0),
        }
    }

    /// Restart the timer and shot counter without touching stacks
    pub fn refresh(&mut self, now: SimTime) {
        self.start_time = now;
        if let BuffDuration::Shots { count } = self.duration {
            self.shots_remaining = Some(count);
        }
    }

    /// Stack multiplier for this buff's stats
    pub fn stack_factor(&self) -> f64 {
        if self.stackable {
            self.current_stacks as f64
        } else {
            1.0
        }
    }
}
