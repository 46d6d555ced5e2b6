//! Stat keys and aggregate stat blocks
//!
//! Percent-style stats are stored as fractions: `0.25` means +25%.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Every stat a buff or static modifier can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    /// Multiplies base attack: `atk * (1 + attack_percent)`
    AttackPercent,
    /// Added after the percent multiplier
    FlatAttack,
    /// Flat attack equal to a fraction of the *caster's* base attack.
    /// Resolved at calculation time from the source's base stats.
    CasterAttackPercent,
    CritRate,
    CritDamage,
    CoreHitRate,
    CoreDamage,
    /// Generic damage increase
    DamageIncrease,
    PartDamage,
    PenetrationDamage,
    DefenseIgnoreDamage,
    DotDamage,
    ChargeDamage,
    ChargeSpeed,
    AttackSpeed,
    ReloadSpeed,
    MaxAmmoPercent,
    MaxAmmoFlat,
    FullBurstDamage,
    EliteDamage,
    /// Received-damage debuff, lives on the enemy
    DamageTaken,
    /// Any positive value makes shots penetrate
    Pierce,
}

/// A bag of stat modifiers, summed per key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatBlock(AHashMap<StatKey, f64>);

impl StatBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style single stat
    pub fn with(mut self, key: StatKey, value: f64) -> Self {
        self.add(key, value);
        self
    }

    /// Value for a key, zero when absent
    pub fn get(&self, key: StatKey) -> f64 {
        self.0.get(&key).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, key: StatKey, value: f64) {
        *self.0.entry(key).or_insert(0.0) += value;
    }

    pub fn set(&mut self, key: StatKey, value: f64) {
        self.0.insert(key, value);
    }

    /// Fold another block in, multiplying each value by `factor`
    pub fn merge_scaled(&mut self, other: &StatBlock, factor: f64) {
        for (key, value) in other.iter() {
            self.add(key, value * factor);
        }
    }

    pub fn merge(&mut self, other: &StatBlock) {
        self.merge_scaled(other, 1.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatKey, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn contains(&self, key: StatKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(StatKey, f64)> for StatBlock {
    fn from_iter<I: IntoIterator<Item = (StatKey, f64)>>(iter: I) -> Self {
        let mut block = StatBlock::new();
        for (key, value) in iter {
            block.add(key, value);
        }
        block
    }
}
