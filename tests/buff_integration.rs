//! Buff engine integration tests
//!
//! Aggregation against a real roster, including caster-relative attack and
//! the interplay of stacking, expiry and shot-limited buffs.

use squad_dps::buffs::{ApplyOutcome, BuffDuration, BuffEngine, BuffKey, BuffSpec, StatBlock, StatKey};
use squad_dps::core::types::{BuffId, CharacterId, TargetId};
use squad_dps::data::{BaseStats, CharacterDefinition, CharacterRoster, WeaponClass};

fn roster() -> CharacterRoster {
    let mut roster = CharacterRoster::new();
    for (id, attack) in [("liter", 20_000.0), ("rapi", 10_000.0)] {
        let stats = BaseStats {
            attack,
            weapon_coefficient: 1.0,
            ammo: 60,
            pellets: 1,
            attack_interval: 0.1,
            reload_time: 1.0,
            charge_coefficient: None,
            piercing: false,
        };
        roster
            .insert(CharacterDefinition::basic(id, WeaponClass::AR, stats))
            .unwrap();
    }
    roster
}

fn rapi() -> TargetId {
    TargetId::Character(CharacterId::from("rapi"))
}

#[test]
fn test_caster_attack_uses_source_base_attack() {
    let roster = roster();
    let mut engine = BuffEngine::new();
    let spec = BuffSpec::new(
        "support_fire",
        StatBlock::new().with(StatKey::CasterAttackPercent, 0.1),
        BuffDuration::Time { seconds: 10.0 },
    );
    engine.apply(&spec, rapi(), "liter".into(), 0.0);

    let total = engine.calculate_total(&rapi(), &StatBlock::new(), 1.0, &roster);
    assert!((total.get(StatKey::FlatAttack) - 2000.0).abs() < 1e-9);
    assert!(!total.contains(StatKey::CasterAttackPercent));
}

#[test]
fn test_stacks_multiply_and_cap() {
    let roster = roster();
    let mut engine = BuffEngine::new();
    let spec = BuffSpec::new(
        "crit_study",
        StatBlock::new().with(StatKey::CritRate, 0.02),
        BuffDuration::Time { seconds: 5.0 },
    )
    .stacking(3);

    assert_eq!(engine.add_stacks(&spec, rapi(), "rapi".into(), 2, 0.0), ApplyOutcome::Added);
    assert_eq!(
        engine.add_stacks(&spec, rapi(), "rapi".into(), 5, 1.0),
        ApplyOutcome::Stacked(3)
    );

    let total = engine.calculate_total(&rapi(), &StatBlock::new(), 2.0, &roster);
    assert!((total.get(StatKey::CritRate) - 0.06).abs() < 1e-12);
}

#[test]
fn test_refresh_extends_expiry() {
    let mut engine = BuffEngine::new();
    let spec = BuffSpec::new(
        "haste",
        StatBlock::new().with(StatKey::AttackSpeed, 0.2),
        BuffDuration::Time { seconds: 5.0 },
    );
    engine.apply(&spec, rapi(), "liter".into(), 0.0);
    assert_eq!(engine.apply(&spec, rapi(), "liter".into(), 4.0), ApplyOutcome::Refreshed);

    assert!(engine.expire(6.0).is_empty());
    assert!(engine.is_active(&rapi(), &BuffId::from("haste"), 8.5));
    assert_eq!(engine.expire(9.5).len(), 1);
    assert!(engine.is_empty());
}

#[test]
fn test_shot_limited_buff_runs_out() {
    let mut engine = BuffEngine::new();
    let spec = BuffSpec::new(
        "loaded",
        StatBlock::new().with(StatKey::ChargeDamage, 1.0),
        BuffDuration::Shots { count: 2 },
    );
    engine.apply(&spec, rapi(), "rapi".into(), 0.0);

    assert!(engine.on_shot_fired(&rapi()).is_empty());
    let finished = engine.on_shot_fired(&rapi());
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, BuffId::from("loaded"));
    assert!(engine.is_empty());
}

#[test]
fn test_conditional_buffs_listed_by_source() {
    let mut engine = BuffEngine::new();
    let conditional = BuffSpec::new(
        "clearance",
        StatBlock::new().with(StatKey::DamageIncrease, 0.25),
        BuffDuration::Conditional,
    );
    let timed = BuffSpec::new("other", StatBlock::new(), BuffDuration::Time { seconds: 3.0 });
    engine.apply(&conditional, rapi(), "liter".into(), 0.0);
    engine.apply(&timed, rapi(), "liter".into(), 0.0);

    let keys = engine.conditional_from(&rapi(), &"liter".into());
    assert_eq!(keys, vec![BuffKey::new("liter".into(), "clearance".into())]);
}

#[test]
fn test_enemy_debuffs_stay_on_the_enemy() {
    let roster = roster();
    let mut engine = BuffEngine::new();
    let spec = BuffSpec::new(
        "suppressed",
        StatBlock::new().with(StatKey::DamageTaken, 0.1),
        BuffDuration::Time { seconds: 10.0 },
    );
    engine.apply(&spec, TargetId::Enemy, "rapi".into(), 0.0);

    let enemy = engine.calculate_total(&TargetId::Enemy, &StatBlock::new(), 1.0, &roster);
    let ally = engine.calculate_total(&rapi(), &StatBlock::new(), 1.0, &roster);
    assert_eq!(enemy.get(StatKey::DamageTaken), 0.1);
    assert_eq!(ally.get(StatKey::DamageTaken), 0.0);
}

#[test]
fn test_remove_from_source_leaves_other_casters() {
    let mut engine = BuffEngine::new();
    let spec = BuffSpec::new(
        "focus",
        StatBlock::new().with(StatKey::DamageIncrease, 0.1),
        BuffDuration::Permanent,
    );
    engine.apply(&spec, rapi(), "liter".into(), 0.0);
    engine.apply(&spec, rapi(), "rapi".into(), 0.0);

    let removed = engine.remove_from_source(&rapi(), &"liter".into(), &"focus".into());
    assert_eq!(removed.map(|b| b.source), Some(CharacterId::from("liter")));
    assert_eq!(engine.buffs_on(&rapi()).len(), 1);
    assert!(engine
        .remove_from_source(&rapi(), &"liter".into(), &"focus".into())
        .is_none());
}
