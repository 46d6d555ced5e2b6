//! Applying fired skills
//!
//! The host (the running simulation) exposes the handful of mutations a
//! skill can make. Effects are applied in declaration order; each effect is
//! expanded to concrete targets first.

use tracing::{debug, trace, warn};

use crate::buffs::{BuffKey, BuffSpec, StatBlock};
use crate::core::types::{BuffId, CharacterId, SimTime, TargetId};
use crate::events::types::CombatEvent;
use crate::skills::definitions::{Effect, TargetMode};
use crate::skills::triggers::{Activation, StateExit};

/// Mutations available to skill effects
pub trait SkillHost {
    fn now(&self) -> SimTime;
    /// Active squad members in slot order
    fn squad(&self) -> Vec<CharacterId>;
    fn used_burst_this_cycle(&self, character: &CharacterId) -> bool;

    fn apply_buff(&mut self, source: &CharacterId, target: TargetId, spec: &BuffSpec, stacks: u32);
    fn remove_buff(&mut self, target: &TargetId, key: &BuffKey) -> bool;
    /// Transform the buff `from` that `source` applied to `target`
    fn transform_buff(
        &mut self,
        source: &CharacterId,
        target: &TargetId,
        from: &BuffId,
        to: &BuffId,
        stats: Option<&StatBlock>,
    ) -> bool;
    /// Targets currently holding the conditional buff `buff` from `source`
    fn conditional_holders(&self, source: &CharacterId, buff: &BuffId) -> Vec<TargetId>;

    fn replace_attack(&mut self, character: &CharacterId, coefficient: f64, shots: Option<u32>, pellets: Option<u32>);
    /// Resolve one skill hit on the enemy and return its damage
    fn skill_damage(&mut self, owner: &CharacterId, skill: &str, coefficient: f64, ignore_defense: bool, dot: bool) -> u64;
    /// Heal `target` for a fraction of `source`'s attack; returns the amount
    fn heal(&mut self, source: &CharacterId, target: &CharacterId, fraction: f64) -> f64;
    /// Bring the next burst-ready forward by `amount` of a cycle
    fn charge_burst(&mut self, amount: f64);
    /// Returns rounds actually added
    fn charge_ammo(&mut self, character: &CharacterId, rounds: u32, fraction: f64) -> u32;
    fn reduce_burst_cooldown(&mut self, character: &CharacterId, seconds: f64);

    /// Announce an event through the dispatcher
    fn notify(&mut self, event: CombatEvent);
}

/// Expand a target mode to concrete targets
pub fn resolve_targets<H: SkillHost + ?Sized>(host: &H, owner: &CharacterId, mode: TargetMode) -> Vec<TargetId> {
    match mode {
        TargetMode::Owner => vec![TargetId::Character(owner.clone())],
        TargetMode::Enemy => vec![TargetId::Enemy],
        TargetMode::AllAllies => host.squad().into_iter().map(TargetId::Character).collect(),
        TargetMode::BurstUsers => host
            .squad()
            .into_iter()
            .filter(|c| host.used_burst_this_cycle(c))
            .map(TargetId::Character)
            .collect(),
        TargetMode::NonBurstUsers => host
            .squad()
            .into_iter()
            .filter(|c| !host.used_burst_this_cycle(c))
            .map(TargetId::Character)
            .collect(),
    }
}

/// Apply every effect of a fired skill, then announce the activation
pub fn apply_activation<H: SkillHost + ?Sized>(host: &mut H, activation: &Activation) {
    let owner = &activation.owner;
    debug!(%owner, skill = %activation.skill, source = ?activation.source, "skill activated");

    for effect in activation.effects.iter() {
        apply_effect(host, owner, &activation.skill, effect);
    }

    host.notify(CombatEvent::SkillActivate {
        character: owner.clone(),
        skill: activation.skill.to_string(),
    });
}

/// Remove the conditional buffs of a state trigger that stopped holding
pub fn apply_state_exit<H: SkillHost + ?Sized>(host: &mut H, exit: &StateExit) {
    for buff in &exit.buffs {
        let key = BuffKey::new(exit.owner.clone(), buff.clone());
        for target in host.conditional_holders(&exit.owner, buff) {
            if host.remove_buff(&target, &key) {
                host.notify(CombatEvent::BuffRemoved {
                    target,
                    buff: buff.clone(),
                });
            }
        }
    }
}

fn apply_effect<H: SkillHost + ?Sized>(host: &mut H, owner: &CharacterId, skill: &str, effect: &Effect) {
    trace!(%owner, skill, effect = effect.name(), "applying effect");
    match effect {
        Effect::ApplyBuff { target, buff } => {
            for t in resolve_targets(&*host, owner, *target) {
                host.apply_buff(owner, t, buff, 1);
            }
        }
        Effect::ApplyStacks { target, buff, stacks } => {
            for t in resolve_targets(&*host, owner, *target) {
                host.apply_buff(owner, t, buff, *stacks);
            }
        }
        Effect::ReplaceAttack {
            coefficient,
            shots,
            pellets,
        } => host.replace_attack(owner, *coefficient, *shots, *pellets),
        Effect::InstantDamage {
            coefficient,
            ignore_defense,
            dot,
        } => {
            host.skill_damage(owner, skill, *coefficient, *ignore_defense, *dot);
        }
        Effect::MultiHitDamage {
            coefficient,
            hits,
            ignore_defense,
            dot,
        } => {
            for _ in 0..*hits {
                host.skill_damage(owner, skill, *coefficient, *ignore_defense, *dot);
            }
        }
        Effect::Heal { target, fraction } => {
            for t in resolve_targets(&*host, owner, *target) {
                match t {
                    TargetId::Character(ally) => {
                        host.heal(owner, &ally, *fraction);
                    }
                    TargetId::Enemy => warn!(%owner, skill, "heal targeting the enemy ignored"),
                }
            }
        }
        Effect::BurstCharge { amount } => host.charge_burst(*amount),
        Effect::AmmoCharge {
            target,
            rounds,
            fraction,
        } => {
            for t in resolve_targets(&*host, owner, *target) {
                if let TargetId::Character(ally) = t {
                    host.charge_ammo(&ally, *rounds, *fraction);
                }
            }
        }
        Effect::BurstCooldownReduction { target, seconds } => {
            for t in resolve_targets(&*host, owner, *target) {
                if let TargetId::Character(ally) = t {
                    host.reduce_burst_cooldown(&ally, *seconds);
                }
            }
        }
        Effect::TransformBuff {
            target,
            from,
            to,
            stats,
        } => {
            for t in resolve_targets(&*host, owner, *target) {
                if !host.transform_buff(owner, &t, from, to, stats.as_ref()) {
                    debug!(%owner, skill, %from, "nothing to transform");
                }
            }
        }
    }
}
