//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a character definition (e.g. "scarlet")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CharacterId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a buff definition, unique per source character
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuffId(pub String);

impl BuffId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BuffId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for BuffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scheduled event identifier (monotonically increasing per scheduler)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

/// Anything a buff can sit on: a squad member or the enemy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetId {
    Character(CharacterId),
    Enemy,
}

impl TargetId {
    pub fn character(&self) -> Option<&CharacterId> {
        match self {
            TargetId::Character(id) => Some(id),
            TargetId::Enemy => None,
        }
    }
}

impl From<CharacterId> for TargetId {
    fn from(id: CharacterId) -> Self {
        TargetId::Character(id)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::Character(id) => write!(f, "{}", id),
            TargetId::Enemy => f.write_str("enemy"),
        }
    }
}

/// Simulated time in seconds
pub type SimTime = f64;

/// Burst position in the I → II → III chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BurstPosition {
    First,
    Second,
    Third,
}

impl BurstPosition {
    pub const ALL: [BurstPosition; 3] = [
        BurstPosition::First,
        BurstPosition::Second,
        BurstPosition::Third,
    ];

    pub fn index(self) -> usize {
        match self {
            BurstPosition::First => 0,
            BurstPosition::Second => 1,
            BurstPosition::Third => 2,
        }
    }
}

impl TryFrom<u8> for BurstPosition {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BurstPosition::First),
            2 => Ok(BurstPosition::Second),
            3 => Ok(BurstPosition::Third),
            other => Err(format!("burst position must be 1, 2 or 3 (got {})", other)),
        }
    }
}

impl From<BurstPosition> for u8 {
    fn from(value: BurstPosition) -> Self {
        value.index() as u8 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_position_roundtrip_through_u8() {
        for pos in BurstPosition::ALL {
            let raw: u8 = pos.into();
            assert_eq!(BurstPosition::try_from(raw).unwrap(), pos);
        }
        assert!(BurstPosition::try_from(4).is_err());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(TargetId::Enemy.to_string(), "enemy");
        assert_eq!(TargetId::Character("rapi".into()).to_string(), "rapi");
    }
}
