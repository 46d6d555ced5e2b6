//! Random rolls for crit and core hits
//!
//! Runs draw from a seeded ChaCha stream so the same seed always gives the
//! same fight. Tests can pin outcomes with `FixedRolls`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform rolls in `[0, 1)`
pub trait RollSource {
    fn roll(&mut self) -> f64;

    /// True with probability `chance`
    fn chance(&mut self, chance: f64) -> bool {
        self.roll() < chance
    }
}

/// Deterministic random stream for one run
#[derive(Debug, Clone)]
pub struct SeededRolls {
    rng: ChaCha8Rng,
}

impl SeededRolls {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RollSource for SeededRolls {
    fn roll(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Cycles through a fixed list of values
#[derive(Debug, Clone)]
pub struct FixedRolls {
    values: Vec<f64>,
    next: usize,
}

impl FixedRolls {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, next: 0 }
    }

    /// Every chance check fails
    pub fn never() -> Self {
        Self::new(vec![1.0])
    }

    /// Every chance check with a positive chance succeeds
    pub fn always() -> Self {
        Self::new(vec![0.0])
    }
}

impl RollSource for FixedRolls {
    fn roll(&mut self) -> f64 {
        if self.values.is_empty() {
            return 1.0;
        }
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}
