//! Running fights: per-run config, the shared combat context, the tick loop
//! and its outputs

pub mod batch;
pub mod config;
pub mod context;
pub mod engine;
pub mod log;
pub mod output;
pub mod requests;

pub use batch::{run_all, run_batch};
pub use config::{RunConfig, SQUAD_SIZE};
pub use context::CombatContext;
pub use engine::{NullObserver, SimObserver, Simulation, StopHandle};
pub use log::{CombatLog, LogEntry, LogKind};
pub use output::{BatchSummary, CharacterSummary, RunSummary, TickSnapshot};
pub use requests::{SimMediator, SimRequest, SimResponse};
