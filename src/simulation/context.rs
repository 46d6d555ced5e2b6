//! Shared state of one run
//!
//! `CombatContext` is what every event handler receives. It owns the
//! scheduler, the buff engine, the per-character states and the trigger
//! engine. Handlers announce follow-up events through its outbox.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::buffs::{ApplyOutcome, BuffKey, BuffSpec, BuffEngine, StatBlock};
use crate::combat::resolver::CombatResolver;
use crate::combat::rolls::{RollSource, SeededRolls};
use crate::combat::state::{counters, AttackOverride, BurstTracker, CharacterCombatState};
use crate::core::error::{Result, SimError};
use crate::core::types::{BuffId, CharacterId, SimTime, TargetId};
use crate::data::{CharacterDefinition, CharacterRoster};
use crate::events::{CombatEvent, EventScheduler, Outbox, RequestOptions};
use crate::simulation::config::RunConfig;
use crate::simulation::log::{CombatLog, LogKind};
use crate::simulation::requests::{self, SimMediator, SimRequest, SimResponse};
use crate::skills::{ConditionProbe, SkillHost, TriggerEngine};

pub struct CombatContext {
    /// Simulated time of the event being handled
    pub time: SimTime,
    pub roster: Arc<CharacterRoster>,
    pub config: RunConfig,
    /// Members taking part, in slot order
    pub squad: Vec<CharacterId>,
    /// Character whose damage is reported
    pub target: CharacterId,
    pub scheduler: EventScheduler,
    pub buffs: BuffEngine,
    pub states: AHashMap<CharacterId, CharacterCombatState>,
    pub burst: BurstTracker,
    pub triggers: TriggerEngine,
    pub requests: SimMediator,
    pub log: CombatLog,
    pub rolls: Box<dyn RollSource>,
    outbox: VecDeque<(SimTime, CombatEvent)>,
}

impl std::fmt::Debug for CombatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatContext")
            .field("time", &self.time)
            .field("squad", &self.squad)
            .field("target", &self.target)
            .field("pending_events", &self.scheduler.pending_len())
            .field("buffs", &self.buffs.len())
            .field("full_burst", &self.burst.full_burst)
            .finish()
    }
}

impl CombatContext {
    /// Build the state of a fresh run. The config must already be valid.
    pub fn new(roster: Arc<CharacterRoster>, config: RunConfig, seed: u64) -> Result<Self> {
        let target = config
            .target()
            .cloned()
            .ok_or_else(|| SimError::Config("no target character".into()))?;

        let mut squad = Vec::new();
        let mut states = AHashMap::new();
        let mut triggers = TriggerEngine::new();
        for id in config.squad.iter().flatten() {
            let Some(definition) = roster.get(id) else {
                warn!(character = %id, "skipping squad member without definition");
                continue;
            };
            squad.push(id.clone());
            states.insert(id.clone(), CharacterCombatState::new(definition));
            triggers.register(definition, 0.0);
        }
        if !states.contains_key(&target) {
            return Err(SimError::UnknownCharacter(target));
        }

        let mut scheduler = EventScheduler::new(config.engine.scheduling_epsilon);
        scheduler.set_horizon(config.duration);

        let mut mediator = SimMediator::new();
        requests::install(&mut mediator);

        let log = CombatLog::new(config.record_log);

        Ok(Self {
            time: 0.0,
            roster,
            config,
            squad,
            target,
            scheduler,
            buffs: BuffEngine::new(),
            states,
            burst: BurstTracker::default(),
            triggers,
            requests: mediator,
            log,
            rolls: Box::new(SeededRolls::new(seed)),
            outbox: VecDeque::new(),
        })
    }

    /// Replace the random stream (tests pin crits and core hits this way)
    pub fn set_rolls(&mut self, rolls: Box<dyn RollSource>) {
        self.rolls = rolls;
    }

    pub fn definition(&self, id: &CharacterId) -> Result<&CharacterDefinition> {
        self.roster
            .get(id)
            .ok_or_else(|| SimError::UnknownCharacter(id.clone()))
    }

    pub fn state(&self, id: &CharacterId) -> Option<&CharacterCombatState> {
        self.states.get(id)
    }

    pub fn state_mut(&mut self, id: &CharacterId) -> Option<&mut CharacterCombatState> {
        self.states.get_mut(id)
    }

    /// Permanent stats a target starts from
    pub fn static_buffs_for(&self, target: &TargetId) -> StatBlock {
        match target {
            TargetId::Character(id) => self.config.static_buffs_for(id),
            TargetId::Enemy => self.config.enemy_debuffs.clone(),
        }
    }

    /// Aggregate stats straight from the buff engine
    pub fn compute_stats(&self, target: &TargetId) -> StatBlock {
        self.buffs
            .calculate_total(target, &self.static_buffs_for(target), self.time, self.roster.as_ref())
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions::fresh(
            self.time,
            Duration::from_millis(self.config.engine.request_timeout_ms),
        )
    }

    /// Aggregate stats through the mediator.
    ///
    /// A failed request falls back to no buffs at all.
    pub fn aggregate(&self, target: &TargetId) -> StatBlock {
        let query = SimRequest::AggregateStats {
            target: target.clone(),
        };
        match self.requests.request(self, &query, self.request_options()) {
            Ok(SimResponse::Stats(stats)) => stats,
            Ok(other) => {
                warn!(%target, response = ?other, "unexpected response to aggregate_stats");
                StatBlock::new()
            }
            Err(e) => {
                warn!(%target, error = %e, "aggregate stats unavailable, using no buffs");
                StatBlock::new()
            }
        }
    }

    pub fn full_burst_active(&self) -> bool {
        self.burst.full_burst
    }

    /// Queue an immediate notification at the current time
    pub fn emit(&mut self, event: CombatEvent) {
        self.outbox.push_back((self.time, event));
    }

    pub fn record(&mut self, kind: LogKind, message: impl Into<String>) {
        self.log.push(self.time, kind, message);
    }
}

impl Outbox for CombatContext {
    fn take_emitted(&mut self) -> Option<(SimTime, CombatEvent)> {
        self.outbox.pop_front()
    }
}

impl ConditionProbe for CombatContext {
    fn full_burst_active(&self) -> bool {
        self.burst.full_burst
    }

    fn is_reloading(&self, character: &CharacterId) -> bool {
        self.states.get(character).is_some_and(|s| s.is_reloading())
    }

    fn ammo_fraction(&self, character: &CharacterId) -> f64 {
        self.states
            .get(character)
            .map(|s| s.ammo_fraction())
            .unwrap_or(0.0)
    }

    fn counter(&self, character: &CharacterId, name: &str) -> f64 {
        self.states
            .get(character)
            .map(|s| s.counter(name))
            .unwrap_or(0.0)
    }

    fn has_buff(&self, character: &CharacterId, buff: &BuffId) -> bool {
        self.buffs
            .is_active(&TargetId::Character(character.clone()), buff, self.time)
    }
}

impl SkillHost for CombatContext {
    fn now(&self) -> SimTime {
        self.time
    }

    fn squad(&self) -> Vec<CharacterId> {
        self.squad.clone()
    }

    fn used_burst_this_cycle(&self, character: &CharacterId) -> bool {
        self.states
            .get(character)
            .is_some_and(|s| s.used_burst_this_cycle)
    }

    fn apply_buff(&mut self, source: &CharacterId, target: TargetId, spec: &BuffSpec, stacks: u32) {
        if let TargetId::Character(id) = &target {
            if !self.states.contains_key(id) {
                return;
            }
        }

        let outcome = self
            .buffs
            .add_stacks(spec, target.clone(), source.clone(), stacks.max(1), self.time);
        let message = match outcome {
            ApplyOutcome::Added => format!("{} gains {} from {}", target, spec.id, source),
            ApplyOutcome::Refreshed => format!("{} refreshed on {}", spec.id, target),
            ApplyOutcome::Stacked(n) => format!("{} on {} at {} stacks", spec.id, target, n),
        };
        self.record(LogKind::Buff, message);
        self.emit(CombatEvent::BuffApplied {
            source: source.clone(),
            target,
            buff: spec.id.clone(),
        });
    }

    fn remove_buff(&mut self, target: &TargetId, key: &BuffKey) -> bool {
        let removed = self.buffs.remove(target, key).is_some();
        if removed {
            self.record(LogKind::Buff, format!("{} fades from {}", key.id, target));
        }
        removed
    }

    fn transform_buff(
        &mut self,
        source: &CharacterId,
        target: &TargetId,
        from: &BuffId,
        to: &BuffId,
        stats: Option<&StatBlock>,
    ) -> bool {
        let done = self
            .buffs
            .transform(target, source, from, to.clone(), stats.cloned());
        if done {
            self.record(LogKind::Buff, format!("{} becomes {} on {}", from, to, target));
        }
        done
    }

    fn conditional_holders(&self, source: &CharacterId, buff: &BuffId) -> Vec<TargetId> {
        self.buffs.conditional_holders(source, buff)
    }

    fn replace_attack(
        &mut self,
        character: &CharacterId,
        coefficient: f64,
        shots: Option<u32>,
        pellets: Option<u32>,
    ) {
        if let Some(state) = self.states.get_mut(character) {
            state.attack_override = Some(AttackOverride {
                coefficient,
                shots_left: shots,
                pellets,
            });
        }
    }

    fn skill_damage(
        &mut self,
        owner: &CharacterId,
        skill: &str,
        coefficient: f64,
        ignore_defense: bool,
        dot: bool,
    ) -> u64 {
        if !self.states.contains_key(owner) {
            return 0;
        }

        let query = SimRequest::SkillDamage {
            character: owner.clone(),
            coefficient,
            ignore_defense,
            dot,
        };
        let raw = match self.requests.request(self, &query, self.request_options()) {
            Ok(SimResponse::Damage(raw)) => raw,
            Ok(other) => {
                warn!(%owner, skill, response = ?other, "unexpected response to skill_damage");
                return 0;
            }
            Err(e) => {
                warn!(%owner, skill, error = %e, "skill damage unavailable");
                return 0;
            }
        };

        let damage = crate::combat::damage::round_damage(raw);
        if let Some(state) = self.states.get_mut(owner) {
            state.skill_damage += damage;
            state.bump(counters::DAMAGE_DEALT, damage as f64);
        }
        self.record(LogKind::Skill, format!("{} {} hits for {}", owner, skill, damage));
        self.emit(CombatEvent::SkillDamage {
            character: owner.clone(),
            skill: skill.to_string(),
            damage,
        });
        damage
    }

    fn heal(&mut self, source: &CharacterId, target: &CharacterId, fraction: f64) -> f64 {
        let query = SimRequest::EffectiveAttack {
            character: source.clone(),
        };
        let attack = match self.requests.request(self, &query, self.request_options()) {
            Ok(SimResponse::Attack(attack)) => attack,
            Ok(_) | Err(_) => {
                debug!(%source, "no attack value for heal");
                return 0.0;
            }
        };

        let amount = attack * fraction;
        if let Some(state) = self.states.get_mut(source) {
            state.healing_done += amount;
        }
        self.record(LogKind::Skill, format!("{} heals {} for {:.0}", source, target, amount));
        self.emit(CombatEvent::Heal {
            source: source.clone(),
            target: target.clone(),
            amount,
        });
        amount
    }

    fn charge_burst(&mut self, amount: f64) {
        if let Err(e) = CombatResolver::charge_burst(self, amount) {
            warn!(error = %e, "burst charge failed");
        }
    }

    fn charge_ammo(&mut self, character: &CharacterId, rounds: u32, fraction: f64) -> u32 {
        let Some(state) = self.states.get_mut(character) else {
            return 0;
        };
        let bonus = rounds.saturating_add((state.max_ammo as f64 * fraction).ceil().max(0.0) as u32);
        let before = state.current_ammo;
        state.current_ammo = before.saturating_add(bonus).min(state.max_ammo);
        let added = state.current_ammo - before;
        if added > 0 {
            self.record(LogKind::Reload, format!("{} gains {} rounds", character, added));
        }
        added
    }

    fn reduce_burst_cooldown(&mut self, character: &CharacterId, seconds: f64) {
        if let Some(state) = self.states.get_mut(character) {
            state.burst_ready_at = (state.burst_ready_at - seconds).max(0.0);
        }
    }

    fn notify(&mut self, event: CombatEvent) {
        self.emit(event);
    }
}
