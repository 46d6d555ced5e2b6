//! Trigger evaluation
//!
//! Event triggers fire from dispatched events. Accumulator, periodic and
//! state triggers are polled once per tick against a read-only probe of the
//! combat state. The engine only decides *that* something fires; applying
//! the effects is the host's job (see `skills::effects`).

use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::types::{BuffId, CharacterId, SimTime};
use crate::data::CharacterDefinition;
use crate::events::types::{CombatEvent, EventKind};
use crate::skills::definitions::{Condition, Effect, Scope, TriggerRule};

/// Read-only view of combat state used by conditions
pub trait ConditionProbe {
    fn full_burst_active(&self) -> bool;
    fn is_reloading(&self, character: &CharacterId) -> bool;
    /// Current ammo over max ammo, 0.0 to 1.0
    fn ammo_fraction(&self, character: &CharacterId) -> f64;
    fn counter(&self, character: &CharacterId, name: &str) -> f64;
    fn has_buff(&self, character: &CharacterId, buff: &BuffId) -> bool;
}

/// Evaluate a condition for a skill owner
pub fn evaluate(condition: &Condition, owner: &CharacterId, probe: &dyn ConditionProbe) -> bool {
    match condition {
        Condition::Always => true,
        Condition::FullBurstActive => probe.full_burst_active(),
        Condition::NotFullBurst => !probe.full_burst_active(),
        Condition::Reloading => probe.is_reloading(owner),
        Condition::NotReloading => !probe.is_reloading(owner),
        Condition::AmmoAtMost { fraction } => probe.ammo_fraction(owner) <= *fraction,
        Condition::AmmoAtLeast { fraction } => probe.ammo_fraction(owner) >= *fraction,
        Condition::CounterAtLeast { counter, value } => probe.counter(owner, counter) >= *value,
        Condition::BuffActive { buff } => probe.has_buff(owner, buff),
    }
}

/// Why an activation happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSource {
    Event(EventKind),
    Accumulator,
    Periodic,
    StateEnter,
}

/// A skill that fired and now needs its effects applied
#[derive(Debug, Clone)]
pub struct Activation {
    pub owner: CharacterId,
    pub skill: Arc<str>,
    pub effects: Arc<[Effect]>,
    pub source: ActivationSource,
}

/// A state trigger whose condition stopped holding
#[derive(Debug, Clone)]
pub struct StateExit {
    pub owner: CharacterId,
    pub skill: Arc<str>,
    /// Conditional buffs the skill applies. They come off every target
    /// holding them, whoever the target mode would pick now.
    pub buffs: Vec<BuffId>,
}

/// Everything a poll produced
#[derive(Debug, Clone, Default)]
pub struct PollResult {
    pub activations: Vec<Activation>,
    pub exits: Vec<StateExit>,
    /// Counters to zero after their accumulator fired
    pub resets: Vec<(CharacterId, String)>,
}

impl PollResult {
    pub fn is_empty(&self) -> bool {
        self.activations.is_empty() && self.exits.is_empty() && self.resets.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Binding {
    owner: CharacterId,
    skill: Arc<str>,
    effects: Arc<[Effect]>,
}

impl Binding {
    fn activate(&self, source: ActivationSource) -> Activation {
        Activation {
            owner: self.owner.clone(),
            skill: self.skill.clone(),
            effects: self.effects.clone(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
struct EventTrigger {
    binding: Binding,
    event: EventKind,
    scope: Scope,
}

#[derive(Debug, Clone)]
struct AccumulatorTrigger {
    binding: Binding,
    counter: String,
    threshold: f64,
    reset: bool,
    last: f64,
}

#[derive(Debug, Clone)]
struct PeriodicTrigger {
    binding: Binding,
    interval: f64,
    condition: Option<Condition>,
    next_check: SimTime,
}

#[derive(Debug, Clone)]
struct StateTrigger {
    binding: Binding,
    condition: Condition,
    active: bool,
}

/// All registered triggers of a run
#[derive(Debug, Clone, Default)]
pub struct TriggerEngine {
    events: Vec<EventTrigger>,
    accumulators: Vec<AccumulatorTrigger>,
    periodic: Vec<PeriodicTrigger>,
    states: Vec<StateTrigger>,
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every trigger of a character's skills. Returns how many.
    pub fn register(&mut self, character: &CharacterDefinition, start: SimTime) -> usize {
        let mut count = 0;
        for skill in &character.skills {
            let binding = Binding {
                owner: character.id.clone(),
                skill: Arc::from(skill.name.as_str()),
                effects: Arc::from(skill.effects.as_slice()),
            };

            for rule in &skill.triggers {
                count += 1;
                match rule {
                    TriggerRule::Event { event, scope } => self.events.push(EventTrigger {
                        binding: binding.clone(),
                        event: *event,
                        scope: *scope,
                    }),
                    TriggerRule::Accumulator {
                        counter,
                        threshold,
                        reset,
                    } => self.accumulators.push(AccumulatorTrigger {
                        binding: binding.clone(),
                        counter: counter.clone(),
                        threshold: *threshold,
                        reset: *reset,
                        last: 0.0,
                    }),
                    TriggerRule::Periodic { interval, condition } => {
                        if !(*interval > 0.0) {
                            debug!(skill = %skill.name, interval, "ignoring periodic trigger with non-positive interval");
                            count -= 1;
                            continue;
                        }
                        self.periodic.push(PeriodicTrigger {
                            binding: binding.clone(),
                            interval: *interval,
                            condition: condition.clone(),
                            next_check: start + interval,
                        })
                    }
                    TriggerRule::State { condition } => self.states.push(StateTrigger {
                        binding: binding.clone(),
                        condition: condition.clone(),
                        active: false,
                    }),
                }
            }
        }

        debug!(character = %character.id, triggers = count, "registered skill triggers");
        count
    }

    /// Event triggers matching a dispatched event, in registration order
    pub fn on_event(&self, event: &CombatEvent) -> Vec<Activation> {
        let kind = event.kind();
        let subject = event.subject();

        self.events
            .iter()
            .filter(|t| t.event == kind)
            .filter(|t| match t.scope {
                Scope::Any => true,
                Scope::Owner => subject == Some(&t.binding.owner),
            })
            .map(|t| t.binding.activate(ActivationSource::Event(kind)))
            .collect()
    }

    /// Check accumulator, periodic and state triggers at `now`
    pub fn poll(&mut self, now: SimTime, probe: &dyn ConditionProbe) -> PollResult {
        let mut result = PollResult::default();

        for acc in &mut self.accumulators {
            let value = probe.counter(&acc.binding.owner, &acc.counter);
            let crossed = acc.last < acc.threshold && value >= acc.threshold;
            acc.last = value;
            if crossed {
                trace!(owner = %acc.binding.owner, counter = %acc.counter, value, "accumulator crossed threshold");
                result.activations.push(acc.binding.activate(ActivationSource::Accumulator));
                if acc.reset {
                    result.resets.push((acc.binding.owner.clone(), acc.counter.clone()));
                    acc.last = 0.0;
                }
            }
        }

        for periodic in &mut self.periodic {
            if now < periodic.next_check {
                continue;
            }
            // Missed checks collapse into this one
            while periodic.next_check <= now {
                periodic.next_check += periodic.interval;
            }
            let holds = periodic
                .condition
                .as_ref()
                .map_or(true, |c| evaluate(c, &periodic.binding.owner, probe));
            if holds {
                result.activations.push(periodic.binding.activate(ActivationSource::Periodic));
            }
        }

        for state in &mut self.states {
            let holds = evaluate(&state.condition, &state.binding.owner, probe);
            match (state.active, holds) {
                (false, true) => {
                    state.active = true;
                    trace!(owner = %state.binding.owner, skill = %state.binding.skill, "state entered");
                    result.activations.push(state.binding.activate(ActivationSource::StateEnter));
                }
                (true, false) => {
                    state.active = false;
                    trace!(owner = %state.binding.owner, skill = %state.binding.skill, "state left");
                    result.exits.push(StateExit {
                        owner: state.binding.owner.clone(),
                        skill: state.binding.skill.clone(),
                        buffs: conditional_buffs(&state.binding.effects),
                    });
                }
                _ => {}
            }
        }

        result
    }

    pub fn len(&self) -> usize {
        self.events.len() + self.accumulators.len() + self.periodic.len() + self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Conditional buffs an effect list applies
fn conditional_buffs(effects: &[Effect]) -> Vec<BuffId> {
    use crate::buffs::BuffDuration;

    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::ApplyBuff { buff, .. } | Effect::ApplyStacks { buff, .. }
                if buff.duration == BuffDuration::Conditional =>
            {
                Some(buff.id.clone())
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffs::{BuffDuration, BuffSpec, StatBlock, StatKey};
    use crate::data::{BaseStats, WeaponClass};
    use crate::skills::definitions::{SkillDefinition, TargetMode};
    use ahash::AHashMap;

    #[derive(Default)]
    struct Probe {
        full_burst: bool,
        reloading: bool,
        ammo: f64,
        counters: AHashMap<String, f64>,
    }

    impl ConditionProbe for Probe {
        fn full_burst_active(&self) -> bool {
            self.full_burst
        }
        fn is_reloading(&self, _: &CharacterId) -> bool {
            self.reloading
        }
        fn ammo_fraction(&self, _: &CharacterId) -> f64 {
            self.ammo
        }
        fn counter(&self, _: &CharacterId, name: &str) -> f64 {
            self.counters.get(name).copied().unwrap_or(0.0)
        }
        fn has_buff(&self, _: &CharacterId, _: &BuffId) -> bool {
            false
        }
    }

    fn character(triggers: Vec<TriggerRule>, effects: Vec<Effect>) -> CharacterDefinition {
        let stats = BaseStats {
            attack: 1000.0,
            weapon_coefficient: 1.0,
            ammo: 10,
            pellets: 1,
            attack_interval: 1.0,
            reload_time: 1.0,
            charge_coefficient: None,
            piercing: false,
        };
        let mut def = CharacterDefinition::basic("rapi", WeaponClass::AR, stats);
        def.skills.push(SkillDefinition {
            name: "test skill".into(),
            triggers,
            effects,
        });
        def
    }

    fn charge() -> Effect {
        Effect::BurstCharge { amount: 0.1 }
    }

    #[test]
    fn test_owner_scope_ignores_other_characters() {
        let mut engine = TriggerEngine::new();
        engine.register(
            &character(
                vec![TriggerRule::Event {
                    event: EventKind::ShotFired,
                    scope: Scope::Owner,
                }],
                vec![charge()],
            ),
            0.0,
        );

        let shot = |who: &str| CombatEvent::ShotFired {
            character: who.into(),
            damage: 1,
            crit_pellets: 0,
            core_pellets: 0,
            pellets: 1,
        };

        assert_eq!(engine.on_event(&shot("rapi")).len(), 1);
        assert!(engine.on_event(&shot("anis")).is_empty());
    }

    #[test]
    fn test_any_scope_hears_squad_events() {
        let mut engine = TriggerEngine::new();
        engine.register(
            &character(
                vec![TriggerRule::Event {
                    event: EventKind::FullBurstStart,
                    scope: Scope::Any,
                }],
                vec![charge()],
            ),
            0.0,
        );
        assert_eq!(engine.on_event(&CombatEvent::FullBurstStart).len(), 1);
    }

    #[test]
    fn test_accumulator_fires_once_per_crossing() {
        let mut engine = TriggerEngine::new();
        engine.register(
            &character(
                vec![TriggerRule::Accumulator {
                    counter: "shots_fired".into(),
                    threshold: 10.0,
                    reset: false,
                }],
                vec![charge()],
            ),
            0.0,
        );

        let mut probe = Probe::default();
        probe.counters.insert("shots_fired".into(), 9.0);
        assert!(engine.poll(0.1, &probe).activations.is_empty());

        probe.counters.insert("shots_fired".into(), 12.0);
        assert_eq!(engine.poll(0.2, &probe).activations.len(), 1);

        probe.counters.insert("shots_fired".into(), 20.0);
        assert!(engine.poll(0.3, &probe).activations.is_empty());
    }

    #[test]
    fn test_accumulator_with_reset_requests_counter_reset() {
        let mut engine = TriggerEngine::new();
        engine.register(
            &character(
                vec![TriggerRule::Accumulator {
                    counter: "crits".into(),
                    threshold: 3.0,
                    reset: true,
                }],
                vec![charge()],
            ),
            0.0,
        );

        let mut probe = Probe::default();
        probe.counters.insert("crits".into(), 3.0);
        let result = engine.poll(0.1, &probe);
        assert_eq!(result.activations.len(), 1);
        assert_eq!(result.resets, vec![(CharacterId::from("rapi"), "crits".to_string())]);

        // Host zeroed the counter, then it climbs again
        probe.counters.insert("crits".into(), 3.0);
        assert_eq!(engine.poll(0.2, &probe).activations.len(), 1);
    }

    #[test]
    fn test_periodic_advances_even_when_condition_fails() {
        let mut engine = TriggerEngine::new();
        engine.register(
            &character(
                vec![TriggerRule::Periodic {
                    interval: 1.0,
                    condition: Some(Condition::FullBurstActive),
                }],
                vec![charge()],
            ),
            0.0,
        );

        let mut probe = Probe::default();
        assert!(engine.poll(1.0, &probe).activations.is_empty());

        // Condition now holds but the next check is at 2.0
        probe.full_burst = true;
        assert!(engine.poll(1.5, &probe).activations.is_empty());
        assert_eq!(engine.poll(2.0, &probe).activations.len(), 1);
    }

    #[test]
    fn test_periodic_does_not_build_backlog() {
        let mut engine = TriggerEngine::new();
        engine.register(
            &character(
                vec![TriggerRule::Periodic {
                    interval: 0.25,
                    condition: None,
                }],
                vec![charge()],
            ),
            0.0,
        );

        let probe = Probe::default();
        assert_eq!(engine.poll(1.0, &probe).activations.len(), 1);
        assert!(engine.poll(1.1, &probe).activations.is_empty());
    }

    #[test]
    fn test_state_enter_and_exit() {
        let conditional = BuffSpec::new(
            "reload_focus",
            StatBlock::new().with(StatKey::CritRate, 0.1),
            BuffDuration::Conditional,
        );
        let mut engine = TriggerEngine::new();
        engine.register(
            &character(
                vec![TriggerRule::State {
                    condition: Condition::Reloading,
                }],
                vec![Effect::ApplyBuff {
                    target: TargetMode::Owner,
                    buff: conditional,
                }],
            ),
            0.0,
        );

        let mut probe = Probe::default();
        probe.reloading = true;
        let entered = engine.poll(0.1, &probe);
        assert_eq!(entered.activations.len(), 1);
        assert_eq!(entered.activations[0].source, ActivationSource::StateEnter);

        // Still reloading: no re-fire
        assert!(engine.poll(0.2, &probe).is_empty());

        probe.reloading = false;
        let left = engine.poll(0.3, &probe);
        assert_eq!(left.exits.len(), 1);
        assert_eq!(left.exits[0].buffs, vec![BuffId::from("reload_focus")]);
    }

    #[test]
    fn test_ammo_conditions() {
        let probe = Probe {
            ammo: 0.25,
            ..Probe::default()
        };
        let owner = CharacterId::from("rapi");
        assert!(evaluate(&Condition::AmmoAtMost { fraction: 0.5 }, &owner, &probe));
        assert!(!evaluate(&Condition::AmmoAtLeast { fraction: 0.5 }, &owner, &probe));
    }
}
