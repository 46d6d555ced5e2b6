//! Queries routed through the mediator
//!
//! Combat and skills ask for aggregate stats and damage numbers here instead
//! of reaching into the buff engine themselves.

use serde::Serialize;

use crate::buffs::StatBlock;
use crate::combat::damage::{compose_damage, DamageInput, HitFlags};
use crate::core::types::{CharacterId, TargetId};
use crate::events::{Mediator, MediatorRequest};
use crate::simulation::context::CombatContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimRequest {
    /// All buffs and static stats on a target, right now
    AggregateStats { target: TargetId },
    /// Unrounded damage of one skill hit on the enemy
    SkillDamage {
        character: CharacterId,
        coefficient: f64,
        ignore_defense: bool,
        dot: bool,
    },
    /// Buffed attack value of a character
    EffectiveAttack { character: CharacterId },
}

impl MediatorRequest for SimRequest {
    fn request_type(&self) -> &'static str {
        match self {
            SimRequest::AggregateStats { .. } => "aggregate_stats",
            SimRequest::SkillDamage { .. } => "skill_damage",
            SimRequest::EffectiveAttack { .. } => "effective_attack",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimResponse {
    Stats(StatBlock),
    Damage(f64),
    Attack(f64),
}

pub type SimMediator = Mediator<CombatContext, SimRequest, SimResponse>;

/// Register the standard responders
pub fn install(mediator: &mut SimMediator) {
    mediator.register_handler("aggregate_stats", Box::new(answer_aggregate_stats));
    mediator.register_handler("skill_damage", Box::new(answer_skill_damage));
    mediator.register_handler("effective_attack", Box::new(answer_effective_attack));
}

fn answer_aggregate_stats(ctx: &CombatContext, query: &SimRequest) -> Option<SimResponse> {
    let SimRequest::AggregateStats { target } = query else {
        return None;
    };
    Some(SimResponse::Stats(ctx.compute_stats(target)))
}

fn answer_skill_damage(ctx: &CombatContext, query: &SimRequest) -> Option<SimResponse> {
    let SimRequest::SkillDamage {
        character,
        coefficient,
        ignore_defense,
        dot,
    } = query
    else {
        return None;
    };

    let definition = ctx.roster.get(character)?;
    let attacker = ctx.compute_stats(&TargetId::Character(character.clone()));
    let enemy = ctx.compute_stats(&TargetId::Enemy);

    let input = DamageInput {
        base_attack: definition.stats.attack,
        coefficient: *coefficient,
        charge_coefficient: None,
        attacker: &attacker,
        enemy: &enemy,
        enemy_defense: ctx.config.enemy.defense,
        flags: HitFlags {
            full_burst: ctx.burst.full_burst,
            part: ctx.config.enemy.has_parts,
            dot: *dot,
            ignore_defense: *ignore_defense,
            elite: ctx.config.enemy.elite,
            ..HitFlags::default()
        },
        collection: &ctx.config.collection,
        rules: &ctx.config.engine,
    };
    Some(SimResponse::Damage(compose_damage(&input)))
}

fn answer_effective_attack(ctx: &CombatContext, query: &SimRequest) -> Option<SimResponse> {
    let SimRequest::EffectiveAttack { character } = query else {
        return None;
    };

    let definition = ctx.roster.get(character)?;
    let stats = ctx.compute_stats(&TargetId::Character(character.clone()));
    let attack = definition.stats.attack * (1.0 + stats.get(crate::buffs::StatKey::AttackPercent))
        + stats.get(crate::buffs::StatKey::FlatAttack);
    Some(SimResponse::Attack(attack))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_types_are_distinct() {
        let a = SimRequest::AggregateStats {
            target: TargetId::Enemy,
        };
        let b = SimRequest::EffectiveAttack {
            character: "rapi".into(),
        };
        assert_ne!(a.request_type(), b.request_type());
    }

    #[test]
    fn test_requests_serialize_for_cache_keys() {
        let query = SimRequest::AggregateStats {
            target: TargetId::Character("rapi".into()),
        };
        let key = serde_json::to_string(&query).unwrap();
        assert!(key.contains("aggregate_stats"));
        assert!(key.contains("rapi"));
    }
}
