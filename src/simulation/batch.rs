//! Independent runs in parallel
//!
//! Runs share nothing but the read-only roster. Run `i` uses seed
//! `config.seed + i`, so a batch is reproducible regardless of thread count.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::core::error::{Result, SimError};
use crate::data::CharacterRoster;
use crate::simulation::config::RunConfig;
use crate::simulation::engine::{NullObserver, Simulation};
use crate::simulation::output::{BatchSummary, RunSummary};

/// Run `config.runs` simulations and return every summary in seed order
pub fn run_all(roster: Arc<CharacterRoster>, config: &RunConfig) -> Result<Vec<RunSummary>> {
    config.validate(&roster)?;

    let mut per_run = config.clone();
    // Paced or logged batches make no sense beyond a single run
    if config.runs > 1 {
        per_run.speed = None;
        per_run.record_log = false;
    }

    (0..config.runs)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed.wrapping_add(u64::from(i));
            let mut sim = Simulation::new(Arc::clone(&roster), per_run.clone(), seed)?;
            sim.run(&mut NullObserver)
        })
        .collect()
}

/// Run the batch and reduce it to DPS statistics
pub fn run_batch(roster: Arc<CharacterRoster>, config: &RunConfig) -> Result<BatchSummary> {
    let start = Instant::now();
    let runs = run_all(roster, config)?;
    let summary = BatchSummary::from_runs(&runs, start.elapsed())
        .ok_or_else(|| SimError::Config("batch produced no runs".into()))?;

    info!(
        runs = summary.runs,
        mean_dps = summary.mean_dps,
        std_dev = summary.std_dev_dps,
        "Batch finished"
    );
    Ok(summary)
}
