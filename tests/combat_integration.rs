//! Combat flow integration tests
//!
//! Whole runs through `Simulation` with pinned rolls, checking the attack,
//! reload and burst timeline end to end.

use std::sync::Arc;

use squad_dps::buffs::{BuffDuration, BuffSpec, StatBlock, StatKey};
use squad_dps::combat::FixedRolls;
use squad_dps::core::error::{Result, SimError};
use squad_dps::core::types::{BurstPosition, SimTime, TargetId};
use squad_dps::data::{BaseStats, CharacterDefinition, CharacterRoster, DistanceTier, WeaponClass};
use squad_dps::events::{CombatEvent, EventKind};
use squad_dps::simulation::{
    CombatContext, NullObserver, RunConfig, SimObserver, Simulation, TickSnapshot,
};
use squad_dps::skills::{Condition, Effect, SkillDefinition, TargetMode, TriggerRule};

fn rifle(id: &str) -> CharacterDefinition {
    CharacterDefinition::basic(
        id,
        WeaponClass::AR,
        BaseStats {
            attack: 1000.0,
            weapon_coefficient: 1.0,
            ammo: 6,
            pellets: 1,
            attack_interval: 1.0,
            reload_time: 5.0,
            charge_coefficient: None,
            piercing: false,
        },
    )
}

fn bursting(id: &str, position: BurstPosition) -> CharacterDefinition {
    let mut def = rifle(id);
    def.burst_position = Some(position);
    def.burst_cooldown = 20.0;
    def
}

fn roster_of(definitions: Vec<CharacterDefinition>) -> Arc<CharacterRoster> {
    let mut roster = CharacterRoster::new();
    for def in definitions {
        roster.insert(def).unwrap();
    }
    Arc::new(roster)
}

/// Far range keeps assault rifles off their optimal-distance bonus
fn config(squad: &[&str], duration: f64) -> RunConfig {
    let mut config = RunConfig::with_squad(squad);
    config.duration = duration;
    config.distance = DistanceTier::Far;
    config.enemy.defense = 0.0;
    config
}

fn run_pinned(roster: Arc<CharacterRoster>, config: RunConfig) -> squad_dps::simulation::RunSummary {
    let seed = config.seed;
    let mut sim = Simulation::new(roster, config, seed)
        .unwrap()
        .with_rolls(Box::new(FixedRolls::never()));
    sim.run(&mut NullObserver).unwrap()
}

#[derive(Default)]
struct Snapshots(Vec<TickSnapshot>);

impl SimObserver for Snapshots {
    fn on_snapshot(&mut self, snapshot: &TickSnapshot) {
        self.0.push(snapshot.clone());
    }
}

impl Snapshots {
    fn at(&self, elapsed: SimTime) -> &TickSnapshot {
        self.0
            .iter()
            .find(|s| (s.elapsed - elapsed).abs() < 0.05)
            .unwrap_or_else(|| panic!("no snapshot near {}", elapsed))
    }
}

#[test]
fn test_six_shots_then_reload() {
    let roster = roster_of(vec![rifle("rapi")]);
    let summary = run_pinned(roster, config(&["rapi"], 10.0));

    let rapi = summary.target_summary().unwrap();
    assert_eq!(rapi.shots_fired, 6);
    assert_eq!(rapi.reloads, 1);
    assert_eq!(summary.total_damage, 6000);
    assert_eq!(summary.scheduling_anomalies, 0);
    assert!(!summary.stopped_early);
}

#[test]
fn test_reload_completes_and_firing_resumes() {
    let roster = roster_of(vec![rifle("rapi")]);
    // Reload starts at t=6 and ends at t=11, so shots resume at 11..
    let summary = run_pinned(roster, config(&["rapi"], 13.5));

    let rapi = summary.target_summary().unwrap();
    assert_eq!(rapi.shots_fired, 9);
    assert_eq!(rapi.reloads, 1);
}

#[test]
fn test_every_crit_and_core_pellet_is_counted() {
    let roster = roster_of(vec![rifle("rapi")]);
    let config = config(&["rapi"], 3.5);
    let mut sim = Simulation::new(roster, config, 1)
        .unwrap()
        .with_rolls(Box::new(FixedRolls::always()));
    let summary = sim.run(&mut NullObserver).unwrap();

    let rapi = summary.target_summary().unwrap();
    assert_eq!(rapi.shots_fired, 4);
    assert_eq!(rapi.crit_rate, 1.0);
    assert_eq!(rapi.core_hit_rate, 1.0);
    // 1000 × (1 + 0.5 crit + 1.0 core)
    assert_eq!(summary.total_damage, 4 * 2500);
}

#[test]
fn test_full_burst_window() {
    let roster = roster_of(vec![
        bursting("liter", BurstPosition::First),
        bursting("dorothy", BurstPosition::Second),
        bursting("alice", BurstPosition::Third),
    ]);
    let mut config = config(&["liter", "dorothy", "alice"], 20.0);
    config.snapshot_interval = 0.1;
    let mut sim = Simulation::new(roster, config, 7)
        .unwrap()
        .with_rolls(Box::new(FixedRolls::never()));
    let mut snapshots = Snapshots::default();
    let summary = sim.run(&mut snapshots).unwrap();

    // Ready at 5, chain ends at 5 + 2 × 0.5, window lasts 10 seconds
    let edges: Vec<(SimTime, bool)> = snapshots
        .0
        .windows(2)
        .filter(|pair| pair[0].full_burst != pair[1].full_burst)
        .map(|pair| (pair[1].elapsed, pair[1].full_burst))
        .collect();
    assert_eq!(edges.len(), 2, "edges: {:?}", edges);
    assert!((edges[0].0 - 6.0).abs() < 1e-6 && edges[0].1);
    assert!((edges[1].0 - 16.0).abs() < 1e-6 && !edges[1].1);
    assert!(!snapshots.at(5.0).full_burst);

    assert_eq!(summary.full_bursts, 1);
    for character in &summary.characters {
        assert_eq!(character.bursts, 1, "{} should burst once", character.character);
    }
}

#[test]
fn test_full_burst_buff_leaves_everyone_who_got_it() {
    let mut liter = bursting("liter", BurstPosition::First);
    liter.skills.push(SkillDefinition {
        name: "Clearance".into(),
        triggers: vec![TriggerRule::State {
            condition: Condition::FullBurstActive,
        }],
        effects: vec![Effect::ApplyBuff {
            target: TargetMode::BurstUsers,
            buff: BuffSpec::new(
                "clearance",
                StatBlock::new().with(StatKey::AttackPercent, 1.0),
                BuffDuration::Conditional,
            ),
        }],
    });
    let mut squad = vec![
        liter,
        bursting("dorothy", BurstPosition::Second),
        bursting("alice", BurstPosition::Third),
    ];
    for member in &mut squad {
        member.burst_cooldown = 40.0;
    }
    let roster = roster_of(squad);

    // The next cycle at 13 clears the burst-user flags before the window
    // closes at 16
    let mut config = config(&["liter", "dorothy", "alice"], 20.0);
    config.engine.burst_cycle = 8.0;
    let mut sim = Simulation::new(roster, config, 3)
        .unwrap()
        .with_rolls(Box::new(FixedRolls::never()));
    let summary = sim.run(&mut NullObserver).unwrap();

    assert_eq!(summary.full_bursts, 1);
    let gained = summary
        .log
        .iter()
        .filter(|e| e.message.contains("gains clearance"))
        .count();
    let faded = summary
        .log
        .iter()
        .filter(|e| e.message.contains("clearance fades"))
        .count();
    assert_eq!(gained, 3);
    assert_eq!(faded, 3);

    let buffs = &sim.context().buffs;
    for id in ["liter", "dorothy", "alice"] {
        let held = buffs.conditional_from(&TargetId::Character(id.into()), &"liter".into());
        assert!(held.is_empty(), "{} still holds {:?}", id, held);
    }
}

#[test]
fn test_burst_chain_stops_at_missing_position() {
    let roster = roster_of(vec![
        bursting("liter", BurstPosition::First),
        bursting("alice", BurstPosition::Third),
    ]);
    let summary = run_pinned(roster, config(&["liter", "alice"], 10.0));

    assert_eq!(summary.full_bursts, 0);
    let bursts: Vec<_> = summary
        .characters
        .iter()
        .map(|c| (c.character.as_str().to_string(), c.bursts))
        .collect();
    assert!(bursts.contains(&("liter".to_string(), 1)));
    assert!(bursts.contains(&("alice".to_string(), 0)));
}

#[test]
fn test_accumulator_skill_deals_damage() {
    let mut rapi = rifle("rapi");
    rapi.skills.push(SkillDefinition {
        name: "Every Third Shot".into(),
        triggers: vec![TriggerRule::Accumulator {
            counter: "shots_fired".into(),
            threshold: 3.0,
            reset: true,
        }],
        effects: vec![Effect::InstantDamage {
            coefficient: 2.0,
            ignore_defense: false,
            dot: false,
        }],
    });
    let roster = roster_of(vec![rapi]);
    let summary = run_pinned(roster, config(&["rapi"], 10.0));

    let rapi = summary.target_summary().unwrap();
    assert_eq!(rapi.shot_damage, 6000);
    // Fires after the 3rd and the 6th shot; skill hits never crit
    assert_eq!(rapi.skill_damage, 4000);
    assert_eq!(summary.total_damage, 10_000);
}

#[test]
fn test_burst_charge_pulls_cycle_forward() {
    let mut liter = bursting("liter", BurstPosition::First);
    liter.skills.push(SkillDefinition {
        name: "Quick Gauge".into(),
        triggers: vec![TriggerRule::Accumulator {
            counter: "shots_fired".into(),
            threshold: 1.0,
            reset: false,
        }],
        effects: vec![Effect::BurstCharge { amount: 0.2 }],
    });
    let roster = roster_of(vec![liter]);

    // Without the charge the first burst would come at t=5
    let summary = run_pinned(roster, config(&["liter"], 3.0));
    assert_eq!(summary.characters[0].bursts, 1);
}

#[test]
fn test_attack_buff_on_burst_raises_shot_damage() {
    let mut liter = bursting("liter", BurstPosition::First);
    liter.skills.push(SkillDefinition {
        name: "Support Fire".into(),
        triggers: vec![TriggerRule::Event {
            event: EventKind::BurstUse,
            scope: Default::default(),
        }],
        effects: vec![Effect::ApplyBuff {
            target: TargetMode::AllAllies,
            buff: BuffSpec::new(
                "support_fire",
                StatBlock::new().with(StatKey::AttackPercent, 0.5),
                BuffDuration::Time { seconds: 100.0 },
            ),
        }],
    });
    let roster = roster_of(vec![liter, rifle("rapi")]);
    let mut config = config(&["liter", "rapi"], 5.5);
    config.target_index = 1;
    config.engine.burst_first_ready = 2.5;

    let summary = run_pinned(roster, config);
    // Shots at 0, 1, 2 plain; 3, 4, 5 with +50% attack
    assert_eq!(summary.total_damage, 3 * 1000 + 3 * 1500);
}

#[test]
fn test_same_seed_same_fight() {
    let build = || roster_of(vec![rifle("rapi"), rifle("anis")]);
    let mut config = config(&["rapi", "anis"], 30.0);
    config.enemy.defense = 100.0;

    let run = |seed| {
        let mut sim = Simulation::new(build(), config.clone(), seed).unwrap();
        sim.run(&mut NullObserver).unwrap()
    };
    let a = run(99);
    let b = run(99);

    assert_eq!(a.total_damage, b.total_damage);
    assert_eq!(a.snapshots, b.snapshots);
    assert_eq!(a.log, b.log);
}

#[test]
fn test_stop_before_run_ends_immediately() {
    let roster = roster_of(vec![rifle("rapi")]);
    let mut sim = Simulation::new(roster, config(&["rapi"], 60.0), 1).unwrap();
    sim.stop_handle().stop();

    let summary = sim.run(&mut NullObserver).unwrap();
    assert!(summary.stopped_early);
    assert_eq!(summary.elapsed, 0.0);
    assert_eq!(summary.total_damage, 0);
}

struct StopAt {
    handle: squad_dps::simulation::StopHandle,
    at: SimTime,
}

impl SimObserver for StopAt {
    fn on_snapshot(&mut self, snapshot: &TickSnapshot) {
        if snapshot.elapsed >= self.at {
            self.handle.stop();
        }
    }
}

#[test]
fn test_stop_mid_run() {
    let roster = roster_of(vec![rifle("rapi")]);
    let mut sim = Simulation::new(roster, config(&["rapi"], 60.0), 1).unwrap();
    let mut observer = StopAt {
        handle: sim.stop_handle(),
        at: 2.95,
    };

    let summary = sim.run(&mut observer).unwrap();
    assert!(summary.stopped_early);
    assert!(summary.elapsed < 3.5);
    let shots = summary.target_summary().unwrap().shots_fired;
    assert!((3..=4).contains(&shots), "fired {} shots", shots);
}

#[test]
fn test_run_twice_is_an_error() {
    let roster = roster_of(vec![rifle("rapi")]);
    let mut sim = Simulation::new(roster, config(&["rapi"], 2.0), 1).unwrap();
    sim.run(&mut NullObserver).unwrap();
    assert!(matches!(sim.run(&mut NullObserver), Err(SimError::Config(_))));
}

fn failing_handler(_ctx: &mut CombatContext, _time: SimTime, event: &CombatEvent) -> Result<()> {
    Err(SimError::handler(event.kind().name(), "boom"))
}

#[test]
fn test_failing_handler_does_not_stop_combat() {
    let roster = roster_of(vec![rifle("rapi")]);
    let mut sim = Simulation::new(roster, config(&["rapi"], 10.0), 1)
        .unwrap()
        .with_rolls(Box::new(FixedRolls::never()));
    sim.dispatcher_mut()
        .subscribe(EventKind::ShotFired, 5, false, Box::new(failing_handler));

    let summary = sim.run(&mut NullObserver).unwrap();
    assert_eq!(summary.handler_errors, 6);
    assert_eq!(summary.total_damage, 6000);
}

#[test]
fn test_snapshots_cover_the_run() {
    let roster = roster_of(vec![rifle("rapi")]);
    let mut sim = Simulation::new(roster, config(&["rapi"], 10.0), 1)
        .unwrap()
        .with_rolls(Box::new(FixedRolls::never()));
    let mut snapshots = Snapshots::default();
    let summary = sim.run(&mut snapshots).unwrap();

    assert_eq!(snapshots.0.len(), 10);
    assert_eq!(summary.snapshots.len(), 10);

    let last = snapshots.0.last().unwrap();
    assert_eq!(last.cumulative_damage, 6000);
    assert!((last.dps - 600.0).abs() < 1e-6);
    // Reloading from t=6 on, so the last window deals nothing
    assert_eq!(last.window_dps, 0.0);
    assert_eq!(last.reloads, 1);
}
