//! Damage resolution
//!
//! One hit goes through a fixed pipeline. Order matters and is part of the
//! combat model:
//!
//! 1. effective attack = base × (1 + attack%) + flat attack
//! 2. subtract defense (unless ignored); below 1 the hit deals exactly 1
//! 3. × weapon coefficient
//! 4. × additive group: 1 + crit + core + optimal distance + full burst
//! 5. × damage-increase group: 1 + damage increase + part + pierce + dot + defense-ignore
//! 6. × charge coefficient (charge weapons), scaled by the collection charge ratio
//! 7. × elite multiplier (elite enemies)
//! 8. × (1 + damage taken) from debuffs on the enemy
//! 9. × collection damage multiplier
//! 10. round to an integer

use serde::{Deserialize, Serialize};

use crate::buffs::{StatBlock, StatKey};
use crate::core::config::SimulationConfig;

/// Situational flags of a single hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitFlags {
    pub crit: bool,
    pub core: bool,
    pub optimal_distance: bool,
    pub full_burst: bool,
    pub part: bool,
    pub penetrating: bool,
    pub dot: bool,
    pub ignore_defense: bool,
    pub elite: bool,
}

/// Size of the enemy's weak point, which sets the base core-hit chance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreSize {
    None,
    Small,
    #[default]
    Medium,
    Large,
}

impl CoreSize {
    pub fn base_hit_rate(self) -> f64 {
        match self {
            CoreSize::None => 0.0,
            CoreSize::Small => 0.25,
            CoreSize::Medium => 0.5,
            CoreSize::Large => 0.75,
        }
    }
}

/// The enemy being shot at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyProfile {
    pub defense: f64,
    pub elite: bool,
    pub core_size: CoreSize,
    /// Hits land on destructible parts
    pub has_parts: bool,
}

impl Default for EnemyProfile {
    fn default() -> Self {
        Self {
            defense: 0.0,
            elite: false,
            core_size: CoreSize::Medium,
            has_parts: false,
        }
    }
}

/// Account-wide weapon collection bonuses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionBonus {
    pub damage_multiplier: f64,
    /// Extra charge damage ratio for charge weapons
    pub charge_ratio: f64,
}

impl Default for CollectionBonus {
    fn default() -> Self {
        Self {
            damage_multiplier: 1.0,
            charge_ratio: 0.0,
        }
    }
}

/// Everything one hit depends on
#[derive(Debug, Clone, Copy)]
pub struct DamageInput<'a> {
    pub base_attack: f64,
    pub coefficient: f64,
    /// Some for charge weapons (and charged skills)
    pub charge_coefficient: Option<f64>,
    /// Aggregate stats of the attacker
    pub attacker: &'a StatBlock,
    /// Aggregate stats of the enemy (debuffs it carries)
    pub enemy: &'a StatBlock,
    pub enemy_defense: f64,
    pub flags: HitFlags,
    pub collection: &'a CollectionBonus,
    pub rules: &'a SimulationConfig,
}

/// Unrounded damage of one hit
pub fn compose_damage(input: &DamageInput) -> f64 {
    let stats = input.attacker;
    let flags = input.flags;
    let rules = input.rules;

    let attack =
        input.base_attack * (1.0 + stats.get(StatKey::AttackPercent)) + stats.get(StatKey::FlatAttack);

    let defense = if flags.ignore_defense {
        0.0
    } else {
        input.enemy_defense
    };
    let after_defense = attack - defense;
    if after_defense < 1.0 {
        return 1.0;
    }

    let mut damage = after_defense * input.coefficient;

    let mut additive = 1.0;
    if flags.crit {
        additive += rules.base_crit_damage + stats.get(StatKey::CritDamage);
    }
    if flags.core {
        additive += rules.core_hit_bonus + stats.get(StatKey::CoreDamage);
    }
    if flags.optimal_distance {
        additive += rules.optimal_distance_bonus;
    }
    if flags.full_burst {
        additive += rules.full_burst_bonus + stats.get(StatKey::FullBurstDamage);
    }
    damage *= additive;

    let mut increase = 1.0 + stats.get(StatKey::DamageIncrease);
    if flags.part {
        increase += stats.get(StatKey::PartDamage);
    }
    if flags.penetrating {
        increase += stats.get(StatKey::PenetrationDamage);
    }
    if flags.dot {
        increase += stats.get(StatKey::DotDamage);
    }
    if flags.ignore_defense {
        increase += stats.get(StatKey::DefenseIgnoreDamage);
    }
    damage *= increase;

    if let Some(charge) = input.charge_coefficient {
        damage *= (charge + stats.get(StatKey::ChargeDamage)) * (1.0 + input.collection.charge_ratio);
    }

    if flags.elite {
        damage *= rules.elite_multiplier + stats.get(StatKey::EliteDamage);
    }

    damage *= 1.0 + input.enemy.get(StatKey::DamageTaken);
    damage * input.collection.damage_multiplier
}

/// Final integer damage of a hit (never below 1)
pub fn resolve_damage(input: &DamageInput) -> u64 {
    round_damage(compose_damage(input))
}

pub fn round_damage(raw: f64) -> u64 {
    if raw.is_finite() {
        raw.round().max(1.0) as u64
    } else {
        1
    }
}

/// Crit chance after buffs, clamped to [0, 1]
pub fn crit_chance(stats: &StatBlock, rules: &SimulationConfig) -> f64 {
    (rules.base_crit_rate + stats.get(StatKey::CritRate)).clamp(0.0, 1.0)
}

/// Core-hit chance after buffs, clamped to [0, 1]
pub fn core_chance(stats: &StatBlock, enemy: &EnemyProfile) -> f64 {
    if enemy.core_size == CoreSize::None {
        return 0.0;
    }
    (enemy.core_size.base_hit_rate() + stats.get(StatKey::CoreHitRate)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        attacker: StatBlock,
        enemy: StatBlock,
        collection: CollectionBonus,
        rules: SimulationConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                attacker: StatBlock::new(),
                enemy: StatBlock::new(),
                collection: CollectionBonus::default(),
                rules: SimulationConfig::default(),
            }
        }

        fn input(&self, flags: HitFlags) -> DamageInput<'_> {
            DamageInput {
                base_attack: 1000.0,
                coefficient: 1.0,
                charge_coefficient: None,
                attacker: &self.attacker,
                enemy: &self.enemy,
                enemy_defense: 0.0,
                flags,
                collection: &self.collection,
                rules: &self.rules,
            }
        }
    }

    #[test]
    fn test_plain_hit_is_attack_times_coefficient() {
        let f = Fixture::new();
        let mut input = f.input(HitFlags::default());
        input.coefficient = 0.5;
        assert_eq!(resolve_damage(&input), 500);
    }

    #[test]
    fn test_attack_percent_then_flat() {
        let mut f = Fixture::new();
        f.attacker = StatBlock::new()
            .with(StatKey::AttackPercent, 0.2)
            .with(StatKey::FlatAttack, 100.0);
        assert_eq!(resolve_damage(&f.input(HitFlags::default())), 1300);
    }

    #[test]
    fn test_defense_floor_is_exactly_one() {
        let f = Fixture::new();
        let mut input = f.input(HitFlags {
            crit: true,
            core: true,
            full_burst: true,
            elite: true,
            ..HitFlags::default()
        });
        input.enemy_defense = 5000.0;
        assert_eq!(compose_damage(&input), 1.0);
        assert_eq!(resolve_damage(&input), 1);
    }

    #[test]
    fn test_ignore_defense_skips_subtraction() {
        let f = Fixture::new();
        let mut input = f.input(HitFlags {
            ignore_defense: true,
            ..HitFlags::default()
        });
        input.enemy_defense = 400.0;
        assert_eq!(resolve_damage(&input), 1000);
    }

    #[test]
    fn test_crit_and_core_share_additive_group() {
        let f = Fixture::new();
        // 1 + 0.5 + 1.0, not 1.5 × 2.0
        let damage = resolve_damage(&f.input(HitFlags {
            crit: true,
            core: true,
            ..HitFlags::default()
        }));
        assert_eq!(damage, 2500);
    }

    #[test]
    fn test_damage_increase_group_multiplies_additive_group() {
        let mut f = Fixture::new();
        f.attacker = StatBlock::new().with(StatKey::DamageIncrease, 0.5);
        let damage = resolve_damage(&f.input(HitFlags {
            crit: true,
            ..HitFlags::default()
        }));
        assert_eq!(damage, 2250);
    }

    #[test]
    fn test_charge_and_collection() {
        let mut f = Fixture::new();
        f.collection = CollectionBonus {
            damage_multiplier: 1.1,
            charge_ratio: 0.1,
        };
        let mut input = f.input(HitFlags::default());
        input.charge_coefficient = Some(2.0);
        // 1000 × 2.0 × 1.1 × 1.1
        assert_eq!(resolve_damage(&input), 2420);
    }

    #[test]
    fn test_elite_and_damage_taken() {
        let mut f = Fixture::new();
        f.enemy = StatBlock::new().with(StatKey::DamageTaken, 0.1);
        let damage = resolve_damage(&f.input(HitFlags {
            elite: true,
            ..HitFlags::default()
        }));
        assert_eq!(damage, 1430);
    }

    #[test]
    fn test_chances_clamped() {
        let rules = SimulationConfig::default();
        let stats = StatBlock::new()
            .with(StatKey::CritRate, 2.0)
            .with(StatKey::CoreHitRate, -5.0);
        assert_eq!(crit_chance(&stats, &rules), 1.0);
        assert_eq!(core_chance(&stats, &EnemyProfile::default()), 0.0);
    }
}
