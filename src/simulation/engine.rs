//! The tick loop
//!
//! Each tick:
//! 1. release scheduled events due by the end of the tick, one at a time, in
//!    `(time, priority, id)` order, dispatching each before the next is popped
//! 2. expire time-limited buffs
//! 3. poll accumulator, periodic and state triggers
//! 4. record a snapshot when one is due
//!
//! Stopping is cooperative: the stop flag is checked at the top of each tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::combat::resolver::CombatResolver;
use crate::combat::rolls::RollSource;
use crate::core::error::{Result, SimError};
use crate::core::types::SimTime;
use crate::data::CharacterRoster;
use crate::events::{CombatEvent, EventDispatcher};
use crate::simulation::config::RunConfig;
use crate::simulation::context::CombatContext;
use crate::simulation::log::{LogEntry, LogKind};
use crate::simulation::output::{per_second, CharacterSummary, RunSummary, TickSnapshot};
use crate::skills::{apply_activation, apply_state_exit};

/// Subscription priority of the skill trigger handler (after combat)
pub const TRIGGER_PRIORITY: i32 = 10;

/// Receives progress while a run is in flight
pub trait SimObserver {
    fn on_snapshot(&mut self, _snapshot: &TickSnapshot) {}
    fn on_log(&mut self, _entry: &LogEntry) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SimObserver for NullObserver {}

/// Cloneable handle that asks a running simulation to stop
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One run of the combat simulation
pub struct Simulation {
    ctx: CombatContext,
    dispatcher: EventDispatcher<CombatContext>,
    stop: StopHandle,
    seed: u64,
    started: bool,
}

impl Simulation {
    /// Validate the config and set up a fresh run
    pub fn new(roster: Arc<CharacterRoster>, config: RunConfig, seed: u64) -> Result<Self> {
        config.validate(&roster)?;
        let ctx = CombatContext::new(roster, config, seed)?;

        let mut dispatcher = EventDispatcher::new();
        CombatResolver::install(&mut dispatcher);
        dispatcher.subscribe_all(TRIGGER_PRIORITY, Box::new(fire_event_triggers));

        Ok(Self {
            ctx,
            dispatcher,
            stop: StopHandle::default(),
            seed,
            started: false,
        })
    }

    /// Pin the hit rolls (before `run`)
    pub fn with_rolls(mut self, rolls: Box<dyn RollSource>) -> Self {
        self.ctx.set_rolls(rolls);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn context(&self) -> &CombatContext {
        &self.ctx
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher<CombatContext> {
        &mut self.dispatcher
    }

    /// Run to the configured duration (or until stopped)
    pub fn run(&mut self, observer: &mut dyn SimObserver) -> Result<RunSummary> {
        if self.started {
            return Err(SimError::Config("simulation already ran".into()));
        }
        self.started = true;

        let wall = Instant::now();
        CombatResolver::start(&mut self.ctx)?;
        self.dispatcher.flush(&mut self.ctx)?;

        let duration = self.ctx.config.duration;
        let tick = self.ctx.config.engine.tick_interval;
        let snapshot_every = self.ctx.config.snapshot_interval;
        let pacing = self.ctx.config.speed.map(|speed| Duration::from_secs_f64(tick / speed));

        info!(
            seed = self.seed,
            duration,
            squad = self.ctx.squad.len(),
            target = %self.ctx.target,
            "Starting run"
        );

        // Tick ends are computed from the tick count so they do not drift
        let ticks = (duration / tick - 1e-9).ceil().max(1.0) as u64;
        let mut elapsed: SimTime = 0.0;
        let mut next_snapshot = snapshot_every;
        let mut last_snapshot = (0.0, 0u64);
        let mut log_cursor = 0;
        let mut snapshots = Vec::new();
        let mut stopped_early = false;

        for n in 1..=ticks {
            if self.stop.is_stopped() {
                info!(elapsed, "Stop requested");
                stopped_early = true;
                break;
            }

            let tick_end = if n == ticks {
                duration
            } else {
                (n as f64 * tick).min(duration)
            };
            self.step(tick_end)?;
            elapsed = tick_end;

            for entry in self.ctx.log.since(log_cursor) {
                observer.on_log(entry);
            }
            log_cursor = self.ctx.log.len();

            if elapsed + 1e-9 >= next_snapshot || elapsed >= duration {
                let snapshot = self.snapshot(elapsed, last_snapshot);
                last_snapshot = (elapsed, snapshot.cumulative_damage);
                observer.on_snapshot(&snapshot);
                snapshots.push(snapshot);
                while next_snapshot <= elapsed + 1e-9 {
                    next_snapshot += snapshot_every;
                }
            }

            if let Some(pause) = pacing {
                std::thread::sleep(pause);
            }
        }

        self.ctx.time = elapsed;
        self.ctx.record(LogKind::System, "Combat ends");
        self.dispatcher.destroy();

        let summary = self.summarize(elapsed, stopped_early, snapshots, wall.elapsed());
        info!(
            dps = summary.dps,
            damage = summary.total_damage,
            anomalies = summary.scheduling_anomalies,
            "Run finished"
        );
        Ok(summary)
    }

    /// Advance the run to `tick_end`
    fn step(&mut self, tick_end: SimTime) -> Result<()> {
        while let Some(event) = self.ctx.scheduler.pop_due(tick_end) {
            self.ctx.time = event.time;
            self.dispatcher.publish(&mut self.ctx, event.time, &event.event)?;
        }
        self.ctx.scheduler.set_processing_time(tick_end);
        self.ctx.time = tick_end;

        for buff in self.ctx.buffs.expire(tick_end) {
            debug!(buff = %buff.id, target = %buff.target, "buff expired");
            self.ctx.record(LogKind::Buff, format!("{} expires on {}", buff.id, buff.target));
            self.ctx.emit(CombatEvent::BuffRemoved {
                target: buff.target,
                buff: buff.id,
            });
        }
        self.dispatcher.flush(&mut self.ctx)?;

        // The engine is taken out so it can read the context while polling
        let mut triggers = std::mem::take(&mut self.ctx.triggers);
        let polled = triggers.poll(tick_end, &self.ctx);
        self.ctx.triggers = triggers;

        for (character, counter) in &polled.resets {
            if let Some(state) = self.ctx.state_mut(character) {
                state.reset_counter(counter);
            }
        }
        for exit in &polled.exits {
            apply_state_exit(&mut self.ctx, exit);
        }
        for activation in &polled.activations {
            apply_activation(&mut self.ctx, activation);
        }
        self.dispatcher.flush(&mut self.ctx)?;
        Ok(())
    }

    fn snapshot(&self, elapsed: SimTime, (last_time, last_damage): (SimTime, u64)) -> TickSnapshot {
        let Some(state) = self.ctx.state(&self.ctx.target) else {
            warn!(target = %self.ctx.target, "target has no combat state");
            return TickSnapshot {
                elapsed,
                cumulative_damage: 0,
                dps: 0.0,
                window_dps: 0.0,
                shots_fired: 0,
                core_hit_rate: 0.0,
                crit_rate: 0.0,
                reloads: 0,
                full_burst: self.ctx.burst.full_burst,
            };
        };

        let damage = state.total_damage();
        TickSnapshot {
            elapsed,
            cumulative_damage: damage,
            dps: per_second(damage, elapsed),
            window_dps: per_second(damage.saturating_sub(last_damage), elapsed - last_time),
            shots_fired: state.shots_fired,
            core_hit_rate: state.core_hit_rate(),
            crit_rate: state.crit_rate(),
            reloads: state.reloads,
            full_burst: self.ctx.burst.full_burst,
        }
    }

    fn summarize(
        &self,
        elapsed: SimTime,
        stopped_early: bool,
        snapshots: Vec<TickSnapshot>,
        wall: Duration,
    ) -> RunSummary {
        let characters: Vec<_> = self
            .ctx
            .squad
            .iter()
            .filter_map(|id| self.ctx.state(id))
            .map(|state| CharacterSummary::from_state(state, elapsed))
            .collect();
        let total_damage = self
            .ctx
            .state(&self.ctx.target)
            .map(|s| s.total_damage())
            .unwrap_or(0);

        RunSummary {
            seed: self.seed,
            elapsed,
            stopped_early,
            target: self.ctx.target.clone(),
            total_damage,
            dps: per_second(total_damage, elapsed),
            full_bursts: self.ctx.burst.full_bursts,
            characters,
            snapshots,
            scheduling_anomalies: self.ctx.scheduler.clamped_count(),
            handler_errors: self.dispatcher.handler_errors(),
            request_timeouts: self.ctx.requests.timeouts(),
            log: self.ctx.log.entries().to_vec(),
            wall_time_ms: wall.as_millis() as u64,
        }
    }
}

/// Dispatcher hook: fire event triggers for every event
fn fire_event_triggers(ctx: &mut CombatContext, _time: SimTime, event: &CombatEvent) -> Result<()> {
    let activations = ctx.triggers.on_event(event);
    for activation in &activations {
        apply_activation(ctx, activation);
    }
    Ok(())
}

