pub mod config;
pub mod error;
pub mod types;

pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use types::{BuffId, BurstPosition, CharacterId, EventId, SimTime, TargetId};
