//! Combat flow: attack → reload → burst
//!
//! The resolver is a set of dispatcher handlers. Each one reads and updates
//! the run context, schedules what comes next and announces what happened
//! through the outbox.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::buffs::{StatBlock, StatKey};
use crate::combat::damage::{compose_damage, core_chance, crit_chance, round_damage, DamageInput, HitFlags};
use crate::combat::state::{counters, CombatPhase};
use crate::core::error::{Result, SimError};
use crate::core::types::{BurstPosition, CharacterId, SimTime, TargetId};
use crate::events::{priority, CombatEvent, EventDispatcher, EventKind};
use crate::simulation::context::CombatContext;
use crate::simulation::log::LogKind;

/// Subscription priority of combat handlers (before triggers and observers)
pub const HANDLER_PRIORITY: i32 = 0;

/// Outcome of one resolved shot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotOutcome {
    pub damage: u64,
    pub pellets: u32,
    pub crit_pellets: u32,
    pub core_pellets: u32,
}

pub struct CombatResolver;

impl CombatResolver {
    /// Subscribe the combat handlers
    pub fn install(dispatcher: &mut EventDispatcher<CombatContext>) {
        dispatcher.subscribe(EventKind::Attack, HANDLER_PRIORITY, false, Box::new(Self::handle_attack));
        dispatcher.subscribe(
            EventKind::ReloadComplete,
            HANDLER_PRIORITY,
            false,
            Box::new(Self::handle_reload_complete),
        );
        dispatcher.subscribe(EventKind::BurstReady, HANDLER_PRIORITY, false, Box::new(Self::handle_burst_ready));
        dispatcher.subscribe(EventKind::BurstUse, HANDLER_PRIORITY, false, Box::new(Self::handle_burst_use));
        dispatcher.subscribe(
            EventKind::FullBurstEnd,
            HANDLER_PRIORITY,
            false,
            Box::new(Self::handle_full_burst_end),
        );
    }

    /// Schedule the opening events: everyone fires at t=0, the first burst
    /// cycle starts at `burst_first_ready`
    pub fn start(ctx: &mut CombatContext) -> Result<()> {
        for id in ctx.squad.clone() {
            ctx.scheduler
                .schedule(0.0, priority::ATTACK, CombatEvent::Attack { character: id })?;
        }

        let first = ctx.config.engine.burst_first_ready;
        let id = ctx.scheduler.schedule(first, priority::BURST, CombatEvent::BurstReady)?;
        ctx.burst.next_ready = Some((id, first));
        ctx.record(LogKind::System, format!("Combat starts with {} characters", ctx.squad.len()));
        Ok(())
    }

    fn handle_attack(ctx: &mut CombatContext, time: SimTime, event: &CombatEvent) -> Result<()> {
        let CombatEvent::Attack { character } = event else {
            return Ok(());
        };
        Self::on_attack(ctx, time, character)
    }

    fn handle_reload_complete(ctx: &mut CombatContext, time: SimTime, event: &CombatEvent) -> Result<()> {
        let CombatEvent::ReloadComplete { character } = event else {
            return Ok(());
        };
        Self::on_reload_complete(ctx, time, character)
    }

    fn handle_burst_ready(ctx: &mut CombatContext, time: SimTime, _: &CombatEvent) -> Result<()> {
        Self::on_burst_ready(ctx, time)
    }

    fn handle_burst_use(ctx: &mut CombatContext, time: SimTime, event: &CombatEvent) -> Result<()> {
        let CombatEvent::BurstUse {
            character,
            position,
            completes_chain,
        } = event
        else {
            return Ok(());
        };
        Self::on_burst_use(ctx, time, character, *position, *completes_chain)
    }

    fn handle_full_burst_end(ctx: &mut CombatContext, time: SimTime, _: &CombatEvent) -> Result<()> {
        Self::on_full_burst_end(ctx, time);
        Ok(())
    }

    /// Fire one shot, or start a reload when the magazine is empty
    pub fn on_attack(ctx: &mut CombatContext, time: SimTime, character: &CharacterId) -> Result<()> {
        let Some(state) = ctx.states.get(character) else {
            debug!(%character, "attack for a character not in this run, dropped");
            return Ok(());
        };
        if state.is_reloading() {
            trace!(%character, "attack while reloading ignored");
            return Ok(());
        }
        if state.current_ammo == 0 {
            return Self::begin_reload(ctx, time, character);
        }

        let shot = Self::resolve_shot(ctx, character)?;

        if let Some(state) = ctx.states.get_mut(character) {
            state.current_ammo -= 1;
            state.shots_fired += 1;
            state.pellets_fired += u64::from(shot.pellets);
            state.crit_pellets += u64::from(shot.crit_pellets);
            state.core_pellets += u64::from(shot.core_pellets);
            state.shot_damage += shot.damage;
            state.bump(counters::SHOTS_FIRED, 1.0);
            state.bump(counters::PELLETS_FIRED, f64::from(shot.pellets));
            state.bump(counters::CRITS, f64::from(shot.crit_pellets));
            state.bump(counters::CORE_HITS, f64::from(shot.core_pellets));
            state.bump(counters::DAMAGE_DEALT, shot.damage as f64);
        }

        let shooter = TargetId::Character(character.clone());
        for buff in ctx.buffs.on_shot_fired(&shooter) {
            ctx.emit(CombatEvent::BuffRemoved {
                target: shooter.clone(),
                buff: buff.id,
            });
        }

        let kind = if shot.crit_pellets > 0 {
            LogKind::Crit
        } else {
            LogKind::Damage
        };
        ctx.record(kind, format!("{} hits for {}", character, shot.damage));
        ctx.emit(CombatEvent::ShotFired {
            character: character.clone(),
            damage: shot.damage,
            crit_pellets: shot.crit_pellets,
            core_pellets: shot.core_pellets,
            pellets: shot.pellets,
        });

        let interval = Self::attack_interval(ctx, character)?;
        ctx.scheduler.schedule(
            time + interval,
            priority::ATTACK,
            CombatEvent::Attack {
                character: character.clone(),
            },
        )?;
        Ok(())
    }

    /// Roll and price one shot. Consumes one shot of any attack override;
    /// counters and ammo are left to the caller.
    pub fn resolve_shot(ctx: &mut CombatContext, character: &CharacterId) -> Result<ShotOutcome> {
        let roster = Arc::clone(&ctx.roster);
        let definition = roster
            .get(character)
            .ok_or_else(|| SimError::UnknownCharacter(character.clone()))?;

        let attacker = ctx.aggregate(&TargetId::Character(character.clone()));
        let enemy = ctx.aggregate(&TargetId::Enemy);

        let (coefficient, pellets) = match ctx.states.get_mut(character) {
            Some(state) => state.take_shot_profile(definition),
            None => (definition.stats.weapon_coefficient, definition.stats.pellets),
        };
        let pellets = pellets.max(1);

        let crit_p = crit_chance(&attacker, &ctx.config.engine);
        let core_p = core_chance(&attacker, &ctx.config.enemy);
        let base_flags = HitFlags {
            optimal_distance: definition.weapon.optimal_distance() == ctx.config.distance,
            full_burst: ctx.burst.full_burst,
            part: ctx.config.enemy.has_parts,
            penetrating: definition.stats.piercing || attacker.get(StatKey::Pierce) > 0.0,
            elite: ctx.config.enemy.elite,
            ..HitFlags::default()
        };

        let mut raw = 0.0;
        let mut crit_pellets = 0;
        let mut core_pellets = 0;
        for _ in 0..pellets {
            let crit = ctx.rolls.chance(crit_p);
            let core = ctx.rolls.chance(core_p);
            crit_pellets += u32::from(crit);
            core_pellets += u32::from(core);

            let input = DamageInput {
                base_attack: definition.stats.attack,
                coefficient,
                charge_coefficient: definition.charge_coefficient(),
                attacker: &attacker,
                enemy: &enemy,
                enemy_defense: ctx.config.enemy.defense,
                flags: HitFlags {
                    crit,
                    core,
                    ..base_flags
                },
                collection: &ctx.config.collection,
                rules: &ctx.config.engine,
            };
            raw += compose_damage(&input);
        }

        // Shotguns report the pellet average as the shot's damage
        if definition.weapon.is_shotgun() {
            raw /= f64::from(pellets);
        }

        Ok(ShotOutcome {
            damage: round_damage(raw),
            pellets,
            crit_pellets,
            core_pellets,
        })
    }

    /// Seconds until the next shot after buffs
    pub fn attack_interval(ctx: &CombatContext, character: &CharacterId) -> Result<f64> {
        let definition = ctx.definition(character)?;
        let stats = ctx.aggregate(&TargetId::Character(character.clone()));
        let mut speed = 1.0 + stats.get(StatKey::AttackSpeed);
        if definition.weapon.is_charge() {
            speed += stats.get(StatKey::ChargeSpeed);
        }
        Ok(definition.stats.attack_interval / speed.max(0.1))
    }

    /// Magazine size after buffs (at least one round)
    pub fn effective_max_ammo(base: u32, stats: &StatBlock) -> u32 {
        let scaled = (f64::from(base) * (1.0 + stats.get(StatKey::MaxAmmoPercent))).floor()
            + stats.get(StatKey::MaxAmmoFlat);
        scaled.max(1.0) as u32
    }

    fn begin_reload(ctx: &mut CombatContext, time: SimTime, character: &CharacterId) -> Result<()> {
        let reload_time = ctx.definition(character)?.stats.reload_time;
        let stats = ctx.aggregate(&TargetId::Character(character.clone()));
        let duration = reload_time / (1.0 + stats.get(StatKey::ReloadSpeed)).max(0.1);

        if let Some(state) = ctx.states.get_mut(character) {
            state.phase = CombatPhase::Reloading;
            state.reloads += 1;
            state.bump(counters::RELOADS, 1.0);
        }

        ctx.scheduler.schedule(
            time + duration,
            priority::RELOAD,
            CombatEvent::ReloadComplete {
                character: character.clone(),
            },
        )?;
        ctx.record(LogKind::Reload, format!("{} reloads ({:.2}s)", character, duration));
        ctx.emit(CombatEvent::ReloadStart {
            character: character.clone(),
        });
        Ok(())
    }

    /// Refill to the buffed magazine size and fire immediately
    pub fn on_reload_complete(ctx: &mut CombatContext, time: SimTime, character: &CharacterId) -> Result<()> {
        let base = ctx.definition(character)?.stats.ammo;
        let stats = ctx.aggregate(&TargetId::Character(character.clone()));
        let max_ammo = Self::effective_max_ammo(base, &stats);

        let Some(state) = ctx.states.get_mut(character) else {
            return Ok(());
        };
        state.max_ammo = max_ammo;
        state.current_ammo = max_ammo;
        state.phase = CombatPhase::Firing;

        ctx.scheduler.schedule(
            time,
            priority::ATTACK,
            CombatEvent::Attack {
                character: character.clone(),
            },
        )?;
        ctx.record(LogKind::Reload, format!("{} reloaded ({} rounds)", character, max_ammo));
        Ok(())
    }

    /// Start a burst cycle: fill positions I → II → III with ready characters
    pub fn on_burst_ready(ctx: &mut CombatContext, time: SimTime) -> Result<()> {
        ctx.burst.cycles += 1;
        for state in ctx.states.values_mut() {
            state.used_burst_this_cycle = false;
        }

        let epsilon = ctx.config.engine.scheduling_epsilon;
        let mut chain: Vec<(CharacterId, BurstPosition)> = Vec::new();
        for position in BurstPosition::ALL {
            let pick = ctx.squad.iter().find(|id| {
                let at_position = ctx
                    .roster
                    .get(id)
                    .is_some_and(|d| d.burst_position == Some(position));
                let ready = ctx
                    .states
                    .get(*id)
                    .is_some_and(|s| s.burst_ready_at <= time + epsilon);
                at_position && ready
            });
            match pick {
                Some(id) => chain.push((id.clone(), position)),
                // The chain cannot skip a position
                None => break,
            }
        }

        let stagger = ctx.config.engine.burst_stagger;
        let full_chain = chain.len() == BurstPosition::ALL.len();
        for (i, (id, position)) in chain.iter().enumerate() {
            let cooldown = ctx.definition(id)?.burst_cooldown;
            if let Some(state) = ctx.states.get_mut(id) {
                state.burst_ready_at = time + cooldown;
                state.used_burst_this_cycle = true;
            }
            ctx.scheduler.schedule(
                time + stagger * i as f64,
                priority::BURST,
                CombatEvent::BurstUse {
                    character: id.clone(),
                    position: *position,
                    completes_chain: full_chain && i + 1 == chain.len(),
                },
            )?;
        }

        if chain.is_empty() {
            ctx.record(LogKind::System, "Burst ready but nobody can burst");
        } else {
            let names: Vec<_> = chain.iter().map(|(id, _)| id.to_string()).collect();
            ctx.record(LogKind::System, format!("Burst chain: {}", names.join(" → ")));
        }

        let next_time = time + ctx.config.engine.burst_cycle;
        let next = ctx.scheduler.schedule(next_time, priority::BURST, CombatEvent::BurstReady)?;
        ctx.burst.next_ready = Some((next, next_time));
        Ok(())
    }

    pub fn on_burst_use(
        ctx: &mut CombatContext,
        time: SimTime,
        character: &CharacterId,
        position: BurstPosition,
        completes_chain: bool,
    ) -> Result<()> {
        if let Some(state) = ctx.states.get_mut(character) {
            state.bursts += 1;
            state.bump(counters::BURSTS, 1.0);
        }
        ctx.record(
            LogKind::Skill,
            format!("{} uses burst {}", character, u8::from(position)),
        );

        if completes_chain {
            let duration = ctx.config.engine.full_burst_duration;
            ctx.burst.full_burst = true;
            ctx.burst.full_bursts += 1;
            // A new chain during full burst restarts the window
            if let Some(previous) = ctx.burst.full_burst_end.take() {
                ctx.scheduler.cancel(previous);
            }
            let end = ctx
                .scheduler
                .schedule(time + duration, priority::BURST_END, CombatEvent::FullBurstEnd)?;
            ctx.burst.full_burst_end = Some(end);
            ctx.record(LogKind::System, format!("Full burst for {:.0}s", duration));
            ctx.emit(CombatEvent::FullBurstStart);
        }
        Ok(())
    }

    pub fn on_full_burst_end(ctx: &mut CombatContext, _time: SimTime) {
        ctx.burst.full_burst = false;
        ctx.burst.full_burst_end = None;
        ctx.record(LogKind::System, "Full burst ends");
    }

    /// Pull the pending burst-ready forward by `amount` of a cycle
    pub fn charge_burst(ctx: &mut CombatContext, amount: f64) -> Result<()> {
        let Some((id, at)) = ctx.burst.next_ready else {
            return Ok(());
        };
        if amount <= 0.0 {
            return Ok(());
        }

        let earlier = (at - amount * ctx.config.engine.burst_cycle).max(ctx.time);
        if !ctx.scheduler.cancel(id) {
            return Err(SimError::EventNotPending(id));
        }
        let next = ctx.scheduler.schedule(earlier, priority::BURST, CombatEvent::BurstReady)?;
        ctx.burst.next_ready = Some((next, earlier));
        trace!(from = at, to = earlier, "burst charged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_ammo() {
        let stats = StatBlock::new()
            .with(StatKey::MaxAmmoPercent, 0.5)
            .with(StatKey::MaxAmmoFlat, 2.0);
        assert_eq!(CombatResolver::effective_max_ammo(10, &stats), 17);
        assert_eq!(CombatResolver::effective_max_ammo(10, &StatBlock::new()), 10);

        let drained = StatBlock::new().with(StatKey::MaxAmmoPercent, -2.0);
        assert_eq!(CombatResolver::effective_max_ammo(10, &drained), 1);
    }
}
