//! Static input data: character definitions and the roster that holds them

pub mod character;
pub mod roster;

pub use character::{BaseStats, CharacterDefinition, DistanceTier, WeaponClass};
pub use roster::CharacterRoster;
