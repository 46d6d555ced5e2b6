//! Engine configuration with documented constants
//!
//! All magic numbers of the combat model are collected here with
//! explanations of their purpose and how they interact with each other.
//! Per-run settings (squad, duration, enemy) live in `simulation::RunConfig`.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};

/// Configuration for the simulation kernel
///
/// These values mirror the game's combat rules. Changing them changes
/// every result, so runs that should be comparable must share a config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === TIME ===
    /// Length of one simulation tick (seconds)
    ///
    /// Accumulator and periodic triggers, state conditions and buff expiry
    /// are polled once per tick. Scheduled events are exact and do not
    /// depend on this value. Smaller = finer trigger resolution, slower runs.
    pub tick_interval: f64,

    /// Offset applied to events scheduled in the past (seconds)
    ///
    /// A handler asking for a time before the event it is processing gets
    /// this much added to the processing time instead. Must be far below
    /// any real interval so it never reorders legitimate events.
    pub scheduling_epsilon: f64,

    // === BURST CYCLE ===
    /// Time of the first burst-ready event (seconds)
    pub burst_first_ready: f64,

    /// Length of a burst cycle (seconds)
    ///
    /// A burst-ready event fires once per cycle regardless of how many
    /// positions were filled in the previous one.
    pub burst_cycle: f64,

    /// Delay between consecutive burst uses in one chain (seconds)
    ///
    /// Full burst starts at `ready + 2 * burst_stagger`.
    pub burst_stagger: f64,

    /// Duration of the full-burst window (seconds)
    pub full_burst_duration: f64,

    // === HIT MODEL ===
    /// Crit chance every character has before buffs (0.0 to 1.0)
    pub base_crit_rate: f64,

    /// Crit damage bonus before buffs
    ///
    /// Enters the additive multiplier group: a crit with no buffs deals
    /// (1 + 0.5) times the base damage.
    pub base_crit_damage: f64,

    /// Core-hit damage bonus before buffs (same additive group as crit)
    pub core_hit_bonus: f64,

    /// Bonus for firing from the weapon's optimal distance tier
    pub optimal_distance_bonus: f64,

    /// Bonus applied to every hit while full burst is active
    pub full_burst_bonus: f64,

    /// Multiplier for hits against an elite enemy (before elite buffs)
    pub elite_multiplier: f64,

    // === MEDIATOR ===
    /// Wall-clock deadline for a mediator request (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            // Time
            tick_interval: 0.1,
            scheduling_epsilon: 1e-6,

            // Burst cycle (first ready after the squad has charged the gauge once)
            burst_first_ready: 5.0,
            burst_cycle: 20.0,
            burst_stagger: 0.5,
            full_burst_duration: 10.0,

            // Hit model
            base_crit_rate: 0.15,
            base_crit_damage: 0.5,
            core_hit_bonus: 1.0,
            optimal_distance_bonus: 0.3,
            full_burst_bonus: 0.5,
            elite_multiplier: 1.3,

            // Mediator
            request_timeout_ms: 5000,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_interval.is_finite() && self.tick_interval > 0.0) {
            return Err(SimError::Config(format!(
                "tick_interval must be positive (got {})",
                self.tick_interval
            )));
        }

        // Epsilon must not be able to push an event past a whole tick
        if !(self.scheduling_epsilon > 0.0 && self.scheduling_epsilon < self.tick_interval / 10.0) {
            return Err(SimError::Config(format!(
                "scheduling_epsilon ({}) must be in (0, tick_interval / 10)",
                self.scheduling_epsilon
            )));
        }

        if self.burst_cycle <= 0.0 || self.full_burst_duration < 0.0 || self.burst_stagger < 0.0 {
            return Err(SimError::Config(
                "burst timings must be non-negative and the cycle positive".into(),
            ));
        }

        // The whole chain has to fit inside one cycle
        if self.burst_stagger * 2.0 >= self.burst_cycle {
            return Err(SimError::Config(format!(
                "burst_stagger ({}) too large for burst_cycle ({})",
                self.burst_stagger, self.burst_cycle
            )));
        }

        if !(0.0..=1.0).contains(&self.base_crit_rate) {
            return Err(SimError::Config("base_crit_rate must be within 0..=1".into()));
        }

        if self.elite_multiplier <= 0.0 {
            return Err(SimError::Config("elite_multiplier must be positive".into()));
        }

        Ok(())
    }
}
