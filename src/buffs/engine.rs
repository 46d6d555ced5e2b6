//! Buff engine: owns every active buff and answers aggregate stat queries
//!
//! No other component mutates the buff collection. Aggregates are
//! recomputed from the live set on every call to `calculate_total`.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::buffs::buff::{Buff, BuffDuration, BuffKey, BuffSpec};
use crate::buffs::stats::{StatBlock, StatKey};
use crate::core::types::{BuffId, CharacterId, SimTime, TargetId};

/// Base-stat lookup needed to resolve caster-relative modifiers
pub trait BaseStatsLookup {
    fn base_attack(&self, character: &CharacterId) -> Option<f64>;
}

/// What `apply` did with the incoming buff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Added,
    Refreshed,
    Stacked(u32),
}

/// Owner of all live buffs, keyed by target
#[derive(Debug, Clone, Default)]
pub struct BuffEngine {
    buffs: BTreeMap<TargetId, Vec<Buff>>,
}

impl BuffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one application of a buff.
    ///
    /// Non-stackable buffs with the same `(source, id)` are refreshed; stackable
    /// ones gain a stack (capped at `max_stacks`) and are refreshed too.
    pub fn apply(
        &mut self,
        spec: &BuffSpec,
        target: TargetId,
        source: CharacterId,
        now: SimTime,
    ) -> ApplyOutcome {
        self.add_stacks(spec, target, source, 1, now)
    }

    /// Apply `stacks` applications at once
    pub fn add_stacks(
        &mut self,
        spec: &BuffSpec,
        target: TargetId,
        source: CharacterId,
        stacks: u32,
        now: SimTime,
    ) -> ApplyOutcome {
        let list = self.buffs.entry(target.clone()).or_default();

        if let Some(existing) = list
            .iter_mut()
            .find(|b| b.id == spec.id && b.source == source)
        {
            existing.refresh(now);
            if existing.stackable {
                existing.current_stacks =
                    (existing.current_stacks + stacks).min(existing.max_stacks);
                trace!(buff = %spec.id, %target, stacks = existing.current_stacks, "buff stacked");
                return ApplyOutcome::Stacked(existing.current_stacks);
            }
            trace!(buff = %spec.id, %target, "buff refreshed");
            return ApplyOutcome::Refreshed;
        }

        let mut buff = Buff::from_spec(spec, target.clone(), source, now);
        if buff.stackable {
            buff.current_stacks = stacks.clamp(1, buff.max_stacks);
        }
        debug!(buff = %spec.id, %target, "buff applied");
        list.push(buff);
        ApplyOutcome::Added
    }

    /// Remove the buff with this key from the target
    pub fn remove(&mut self, target: &TargetId, key: &BuffKey) -> Option<Buff> {
        let list = self.buffs.get_mut(target)?;
        let index = list
            .iter()
            .position(|b| b.id == key.id && b.source == key.source)?;
        Some(list.remove(index))
    }

    /// Remove the buff `id` applied by `source`
    pub fn remove_from_source(
        &mut self,
        target: &TargetId,
        source: &CharacterId,
        id: &BuffId,
    ) -> Option<Buff> {
        self.remove(target, &BuffKey::new(source.clone(), id.clone()))
    }

    /// Replace one buff with another in place.
    ///
    /// Only the buff `from` applied by `source` is touched. Target, duration
    /// type and timing are preserved and stats are replaced when `new_stats`
    /// is given. If the target already holds `to` from the same source the
    /// old buff is folded into it instead: stacks add up to the cap and the
    /// later end time wins. Returns false if nothing matched.
    pub fn transform(
        &mut self,
        target: &TargetId,
        source: &CharacterId,
        from: &BuffId,
        to: BuffId,
        new_stats: Option<StatBlock>,
    ) -> bool {
        let Some(list) = self.buffs.get_mut(target) else {
            return false;
        };
        let Some(index) = list
            .iter()
            .position(|b| &b.id == from && &b.source == source)
        else {
            return false;
        };

        if let Some(existing) = list
            .iter()
            .position(|b| b.id == to && &b.source == source)
        {
            let old = list.remove(index);
            let existing = if existing > index { existing - 1 } else { existing };
            let merged = &mut list[existing];
            if merged.stackable {
                merged.current_stacks = merged
                    .current_stacks
                    .saturating_add(old.current_stacks)
                    .min(merged.max_stacks);
            }
            if merged.end_time().zip(old.end_time()).is_some_and(|(a, b)| b > a) {
                merged.start_time = old.start_time;
                merged.duration = old.duration;
            }
            if let Some(stats) = new_stats {
                merged.stats = stats;
            }
            debug!(%target, from = %from, to = %to, "buff merged into existing");
            return true;
        }

        let buff = &mut list[index];
        debug!(%target, from = %from, to = %to, "buff transformed");
        buff.id = to;
        if let Some(stats) = new_stats {
            buff.stats = stats;
        }
        true
    }

    /// Drop every time-limited buff whose end time is before `now`
    pub fn expire(&mut self, now: SimTime) -> Vec<Buff> {
        let mut expired = Vec::new();
        for list in self.buffs.values_mut() {
            let mut i = 0;
            while i < list.len() {
                let done = matches!(list[i].end_time(), Some(end) if end < now);
                if done {
                    expired.push(list.remove(i));
                } else {
                    i += 1;
                }
            }
        }
        expired
    }

    /// Count down shot-limited buffs on a character that just fired
    pub fn on_shot_fired(&mut self, target: &TargetId) -> Vec<Buff> {
        let Some(list) = self.buffs.get_mut(target) else {
            return Vec::new();
        };

        for buff in list.iter_mut() {
            if let Some(remaining) = buff.shots_remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
            }
        }

        let mut finished = Vec::new();
        let mut i = 0;
        while i < list.len() {
            if list[i].shots_remaining == Some(0) {
                finished.push(list.remove(i));
            } else {
                i += 1;
            }
        }
        finished
    }

    /// Aggregate stats for a target at `now`.
    ///
    /// Starts from `static_buffs` and folds in every active buff, multiplying
    /// stackable values by their stack count. Caster-relative attack is
    /// converted to flat attack from the source's base attack.
    pub fn calculate_total(
        &self,
        target: &TargetId,
        static_buffs: &StatBlock,
        now: SimTime,
        lookup: &dyn BaseStatsLookup,
    ) -> StatBlock {
        let mut total = static_buffs.clone();

        let Some(list) = self.buffs.get(target) else {
            return total;
        };

        for buff in list.iter().filter(|b| b.is_active_at(now)) {
            let factor = buff.stack_factor();
            for (key, value) in buff.stats.iter() {
                if key == StatKey::CasterAttackPercent {
                    match lookup.base_attack(&buff.source) {
                        Some(base) => total.add(StatKey::FlatAttack, base * value * factor),
                        None => trace!(source = %buff.source, "caster attack buff without source stats"),
                    }
                } else {
                    total.add(key, value * factor);
                }
            }
        }

        total
    }

    pub fn buffs_on(&self, target: &TargetId) -> &[Buff] {
        self.buffs.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, target: &TargetId, key: &BuffKey) -> Option<&Buff> {
        self.buffs_on(target)
            .iter()
            .find(|b| b.id == key.id && b.source == key.source)
    }

    pub fn is_active(&self, target: &TargetId, id: &BuffId, now: SimTime) -> bool {
        self.buffs_on(target)
            .iter()
            .any(|b| &b.id == id && b.is_active_at(now))
    }

    pub fn stacks(&self, target: &TargetId, key: &BuffKey) -> u32 {
        self.get(target, key).map(|b| b.current_stacks).unwrap_or(0)
    }

    /// Conditional buffs applied by a source
    pub fn conditional_from(&self, target: &TargetId, source: &CharacterId) -> Vec<BuffKey> {
        self.buffs_on(target)
            .iter()
            .filter(|b| &b.source == source && b.duration == BuffDuration::Conditional)
            .map(Buff::key)
            .collect()
    }

    /// Every target holding the conditional buff `id` from `source`
    pub fn conditional_holders(&self, source: &CharacterId, id: &BuffId) -> Vec<TargetId> {
        self.buffs
            .keys()
            .filter(|target| {
                self.conditional_from(target, source)
                    .iter()
                    .any(|key| &key.id == id)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.buffs.clear();
    }
}
