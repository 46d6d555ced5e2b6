//! Combat event vocabulary

use serde::{Deserialize, Serialize};

use crate::core::types::{BuffId, BurstPosition, CharacterId, EventId, SimTime, TargetId};

/// Subscription key for a combat event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Attack,
    ShotFired,
    ReloadStart,
    ReloadComplete,
    BurstReady,
    BurstUse,
    FullBurstStart,
    FullBurstEnd,
    BuffApplied,
    BuffRemoved,
    SkillActivate,
    Heal,
    SkillDamage,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Attack => "attack",
            EventKind::ShotFired => "shot_fired",
            EventKind::ReloadStart => "reload_start",
            EventKind::ReloadComplete => "reload_complete",
            EventKind::BurstReady => "burst_ready",
            EventKind::BurstUse => "burst_use",
            EventKind::FullBurstStart => "full_burst_start",
            EventKind::FullBurstEnd => "full_burst_end",
            EventKind::BuffApplied => "buff_applied",
            EventKind::BuffRemoved => "buff_removed",
            EventKind::SkillActivate => "skill_activate",
            EventKind::Heal => "heal",
            EventKind::SkillDamage => "skill_damage",
        }
    }
}

/// A combat event with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Character tries to fire its next shot
    Attack { character: CharacterId },
    /// A shot was resolved
    ShotFired {
        character: CharacterId,
        damage: u64,
        crit_pellets: u32,
        core_pellets: u32,
        pellets: u32,
    },
    ReloadStart { character: CharacterId },
    ReloadComplete { character: CharacterId },
    /// Start of a burst cycle
    BurstReady,
    BurstUse {
        character: CharacterId,
        position: BurstPosition,
        /// Last use of a complete I → II → III chain
        completes_chain: bool,
    },
    FullBurstStart,
    FullBurstEnd,
    BuffApplied {
        source: CharacterId,
        target: TargetId,
        buff: BuffId,
    },
    BuffRemoved { target: TargetId, buff: BuffId },
    SkillActivate { character: CharacterId, skill: String },
    Heal {
        source: CharacterId,
        target: CharacterId,
        amount: f64,
    },
    SkillDamage {
        character: CharacterId,
        skill: String,
        damage: u64,
    },
}

impl CombatEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CombatEvent::Attack { .. } => EventKind::Attack,
            CombatEvent::ShotFired { .. } => EventKind::ShotFired,
            CombatEvent::ReloadStart { .. } => EventKind::ReloadStart,
            CombatEvent::ReloadComplete { .. } => EventKind::ReloadComplete,
            CombatEvent::BurstReady => EventKind::BurstReady,
            CombatEvent::BurstUse { .. } => EventKind::BurstUse,
            CombatEvent::FullBurstStart => EventKind::FullBurstStart,
            CombatEvent::FullBurstEnd => EventKind::FullBurstEnd,
            CombatEvent::BuffApplied { .. } => EventKind::BuffApplied,
            CombatEvent::BuffRemoved { .. } => EventKind::BuffRemoved,
            CombatEvent::SkillActivate { .. } => EventKind::SkillActivate,
            CombatEvent::Heal { .. } => EventKind::Heal,
            CombatEvent::SkillDamage { .. } => EventKind::SkillDamage,
        }
    }

    /// The character this event is about, if any.
    ///
    /// Owner-scoped triggers only fire when this matches their owner.
    pub fn subject(&self) -> Option<&CharacterId> {
        match self {
            CombatEvent::Attack { character }
            | CombatEvent::ShotFired { character, .. }
            | CombatEvent::ReloadStart { character }
            | CombatEvent::ReloadComplete { character }
            | CombatEvent::BurstUse { character, .. }
            | CombatEvent::SkillActivate { character, .. }
            | CombatEvent::SkillDamage { character, .. } => Some(character),
            CombatEvent::BuffApplied { target, .. } | CombatEvent::BuffRemoved { target, .. } => {
                target.character()
            }
            CombatEvent::Heal { target, .. } => Some(target),
            CombatEvent::BurstReady | CombatEvent::FullBurstStart | CombatEvent::FullBurstEnd => {
                None
            }
        }
    }
}

/// Dispatch priorities at equal time (lower fires first)
pub mod priority {
    pub const BURST_END: i32 = 0;
    pub const RELOAD: i32 = 10;
    pub const BURST: i32 = 20;
    pub const ATTACK: i32 = 30;
    pub const DEFAULT: i32 = 50;
    pub const NOTIFY: i32 = 90;
}

/// An event sitting in (or popped from) the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: EventId,
    pub time: SimTime,
    pub priority: i32,
    pub event: CombatEvent,
}

impl ScheduledEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}
