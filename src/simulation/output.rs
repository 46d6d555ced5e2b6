//! Run results and serialization

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::combat::state::CharacterCombatState;
use crate::core::types::{CharacterId, SimTime};
use crate::simulation::log::LogEntry;

/// Progress of the measured character at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub elapsed: SimTime,
    pub cumulative_damage: u64,
    /// Cumulative damage over elapsed time
    pub dps: f64,
    /// Damage per second since the previous snapshot
    pub window_dps: f64,
    pub shots_fired: u64,
    pub core_hit_rate: f64,
    pub crit_rate: f64,
    pub reloads: u32,
    pub full_burst: bool,
}

/// End-of-run numbers for one squad member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub character: CharacterId,
    pub total_damage: u64,
    pub shot_damage: u64,
    pub skill_damage: u64,
    pub dps: f64,
    pub shots_fired: u64,
    pub crit_rate: f64,
    pub core_hit_rate: f64,
    pub reloads: u32,
    pub bursts: u32,
    pub healing_done: f64,
}

impl CharacterSummary {
    pub fn from_state(state: &CharacterCombatState, elapsed: SimTime) -> Self {
        let total = state.total_damage();
        Self {
            character: state.character.clone(),
            total_damage: total,
            shot_damage: state.shot_damage,
            skill_damage: state.skill_damage,
            dps: per_second(total, elapsed),
            shots_fired: state.shots_fired,
            crit_rate: state.crit_rate(),
            core_hit_rate: state.core_hit_rate(),
            reloads: state.reloads,
            bursts: state.bursts,
            healing_done: state.healing_done,
        }
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    /// Simulated seconds actually covered (shorter if stopped early)
    pub elapsed: SimTime,
    pub stopped_early: bool,
    pub target: CharacterId,
    pub total_damage: u64,
    pub dps: f64,
    pub full_bursts: u32,
    pub characters: Vec<CharacterSummary>,
    pub snapshots: Vec<TickSnapshot>,
    /// Events scheduled in the past and moved forward
    pub scheduling_anomalies: u64,
    pub handler_errors: u64,
    pub request_timeouts: u64,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    pub wall_time_ms: u64,
}

impl RunSummary {
    pub fn target_summary(&self) -> Option<&CharacterSummary> {
        self.characters.iter().find(|c| c.character == self.target)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        let (crit, core) = self
            .target_summary()
            .map(|c| (c.crit_rate, c.core_hit_rate))
            .unwrap_or_default();
        format!(
            "{}: {} damage in {:.1}s ({:.0} DPS), crit {:.1}%, core {:.1}%, {} full bursts",
            self.target,
            self.total_damage,
            self.elapsed,
            self.dps,
            crit * 100.0,
            core * 100.0,
            self.full_bursts,
        )
    }
}

/// Aggregate over independent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub runs: usize,
    pub target: CharacterId,
    pub mean_dps: f64,
    pub min_dps: f64,
    pub max_dps: f64,
    pub std_dev_dps: f64,
    pub mean_damage: f64,
    pub wall_time_ms: u64,
}

impl BatchSummary {
    /// None for an empty slice
    pub fn from_runs(runs: &[RunSummary], wall_time: Duration) -> Option<Self> {
        let first = runs.first()?;
        let n = runs.len() as f64;
        let dps: Vec<f64> = runs.iter().map(|r| r.dps).collect();

        let mean = dps.iter().sum::<f64>() / n;
        let variance = dps.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        let min = dps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = dps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_damage = runs.iter().map(|r| r.total_damage as f64).sum::<f64>() / n;

        Some(Self {
            runs: runs.len(),
            target: first.target.clone(),
            mean_dps: mean,
            min_dps: min,
            max_dps: max,
            std_dev_dps: variance.sqrt(),
            mean_damage,
            wall_time_ms: wall_time.as_millis() as u64,
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} runs for {} in {}ms\nDPS mean {:.0} (min {:.0}, max {:.0}, sd {:.1})",
            self.runs,
            self.target,
            self.wall_time_ms,
            self.mean_dps,
            self.min_dps,
            self.max_dps,
            self.std_dev_dps,
        )
    }
}

pub(crate) fn per_second(damage: u64, elapsed: SimTime) -> f64 {
    if elapsed > 0.0 {
        damage as f64 / elapsed
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(dps: f64) -> RunSummary {
        RunSummary {
            seed: 0,
            elapsed: 10.0,
            stopped_early: false,
            target: "rapi".into(),
            total_damage: (dps * 10.0) as u64,
            dps,
            full_bursts: 0,
            characters: Vec::new(),
            snapshots: Vec::new(),
            scheduling_anomalies: 0,
            handler_errors: 0,
            request_timeouts: 0,
            log: Vec::new(),
            wall_time_ms: 0,
        }
    }

    #[test]
    fn test_batch_statistics() {
        let runs = vec![run(100.0), run(200.0), run(300.0)];
        let batch = BatchSummary::from_runs(&runs, Duration::from_millis(5)).unwrap();

        assert_eq!(batch.runs, 3);
        assert_eq!(batch.mean_dps, 200.0);
        assert_eq!(batch.min_dps, 100.0);
        assert_eq!(batch.max_dps, 300.0);
        assert!((batch.std_dev_dps - 81.6496580927726).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_is_none() {
        assert!(BatchSummary::from_runs(&[], Duration::ZERO).is_none());
    }

    #[test]
    fn test_per_second_handles_zero_time() {
        assert_eq!(per_second(100, 0.0), 0.0);
        assert_eq!(per_second(100, 4.0), 25.0);
    }
}
