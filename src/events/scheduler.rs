//! Time-ordered queue of future combat events
//!
//! Events are released in strict `(time, priority, id)` order. The time
//! cursor only moves forward; requests to schedule behind it are clamped
//! forward by a small epsilon and counted.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use tracing::{trace, warn};

use crate::core::error::{Result, SimError};
use crate::core::types::{EventId, SimTime};
use crate::events::types::{CombatEvent, ScheduledEvent};

/// Heap ordering key; field order defines the total order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    time: OrderedFloat<f64>,
    priority: i32,
    id: EventId,
}

#[derive(Debug, Clone, Copy)]
struct Repeat {
    interval: f64,
    /// Occurrences still to fire, including the pending one
    remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct Pending {
    event: ScheduledEvent,
    repeat: Option<Repeat>,
}

/// Priority queue of scheduled events
#[derive(Debug, Clone)]
pub struct EventScheduler {
    queue: BinaryHeap<Reverse<QueueKey>>,
    /// Live entries; heap keys without an entry here were cancelled
    pending: AHashMap<EventId, Pending>,
    next_id: u64,
    current_time: SimTime,
    epsilon: f64,
    /// Repeating events are not re-armed past this time
    horizon: SimTime,
    clamped: u64,
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new(1e-6)
    }
}

impl EventScheduler {
    pub fn new(epsilon: f64) -> Self {
        Self {
            queue: BinaryHeap::new(),
            pending: AHashMap::new(),
            next_id: 0,
            current_time: 0.0,
            epsilon,
            horizon: f64::INFINITY,
            clamped: 0,
        }
    }

    /// Limit for re-arming repeating events (the run duration)
    pub fn set_horizon(&mut self, horizon: SimTime) {
        self.horizon = horizon;
    }

    /// Schedule a one-off event.
    ///
    /// Non-finite times are rejected. Times behind the cursor are moved to
    /// `current_time + epsilon` and counted as a scheduling anomaly.
    pub fn schedule(&mut self, time: SimTime, priority: i32, event: CombatEvent) -> Result<EventId> {
        let time = self.checked_time(time, &event)?;
        let id = self.allocate_id();
        self.insert(id, time, priority, event, None);
        Ok(id)
    }

    /// Schedule an event that re-arms itself every `interval` seconds.
    ///
    /// Stops after `count` occurrences (if given) or once the next
    /// occurrence would fall past the horizon. The id stays the same for the
    /// whole series, so `cancel` stops it.
    pub fn schedule_repeating(
        &mut self,
        start: SimTime,
        interval: f64,
        priority: i32,
        event: CombatEvent,
        count: Option<u32>,
    ) -> Result<EventId> {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(SimError::InvalidSchedule(format!(
                "repeat interval must be finite and positive (got {})",
                interval
            )));
        }
        if count == Some(0) {
            return Err(SimError::InvalidSchedule("repeat count must be at least 1".into()));
        }

        let start = self.checked_time(start, &event)?;
        let id = self.allocate_id();
        let repeat = Repeat {
            interval,
            remaining: count,
        };
        self.insert(id, start, priority, event, Some(repeat));
        Ok(id)
    }

    /// Remove a pending event. Returns false if it already fired or never existed.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let removed = self.pending.remove(&id).is_some();
        if removed {
            trace!(?id, "event cancelled");
        }
        removed
    }

    /// Pop the next event due at or before `until`, moving the cursor to it
    pub fn pop_due(&mut self, until: SimTime) -> Option<ScheduledEvent> {
        loop {
            let Reverse(key) = *self.queue.peek()?;
            if key.time.0 > until {
                return None;
            }
            self.queue.pop();

            // Cancelled entries leave their heap key behind
            let Some(entry) = self.pending.remove(&key.id) else {
                continue;
            };

            self.current_time = self.current_time.max(key.time.0);
            self.rearm(&entry);
            return Some(entry.event);
        }
    }

    /// Release every event due by `until`, in order, and move the cursor there
    pub fn advance(&mut self, until: SimTime) -> Vec<ScheduledEvent> {
        let mut due = Vec::new();
        while let Some(event) = self.pop_due(until) {
            due.push(event);
        }
        self.current_time = self.current_time.max(until);
        due
    }

    /// Time of the next live event, if any
    pub fn next_time(&mut self) -> Option<SimTime> {
        while let Some(Reverse(key)) = self.queue.peek().copied() {
            if self.pending.contains_key(&key.id) {
                return Some(key.time.0);
            }
            self.queue.pop();
        }
        None
    }

    /// Move the cursor to the time being processed. Never moves backwards.
    pub fn set_processing_time(&mut self, time: SimTime) {
        if time.is_finite() {
            self.current_time = self.current_time.max(time);
        }
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of requests that were clamped forward
    pub fn clamped_count(&self) -> u64 {
        self.clamped
    }

    /// Drop every pending event; the cursor stays where it is
    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }

    fn allocate_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }

    fn checked_time(&mut self, time: SimTime, event: &CombatEvent) -> Result<SimTime> {
        if !time.is_finite() {
            return Err(SimError::InvalidSchedule(format!(
                "{} scheduled at non-finite time {}",
                event.kind().name(),
                time
            )));
        }

        if time < self.current_time {
            let corrected = self.current_time + self.epsilon;
            self.clamped += 1;
            warn!(
                event = event.kind().name(),
                requested = time,
                corrected,
                "event scheduled in the past, moved forward"
            );
            return Ok(corrected);
        }

        Ok(time)
    }

    fn insert(
        &mut self,
        id: EventId,
        time: SimTime,
        priority: i32,
        event: CombatEvent,
        repeat: Option<Repeat>,
    ) {
        self.queue.push(Reverse(QueueKey {
            time: OrderedFloat(time),
            priority,
            id,
        }));
        self.pending.insert(
            id,
            Pending {
                event: ScheduledEvent {
                    id,
                    time,
                    priority,
                    event,
                },
                repeat,
            },
        );
    }

    fn rearm(&mut self, fired: &Pending) {
        let Some(repeat) = fired.repeat else {
            return;
        };

        let remaining = match repeat.remaining {
            Some(1) => return,
            Some(n) => Some(n - 1),
            None => None,
        };

        let next = fired.event.time + repeat.interval;
        if next > self.horizon {
            return;
        }

        self.insert(
            fired.event.id,
            next,
            fired.event.priority,
            fired.event.event.clone(),
            Some(Repeat {
                interval: repeat.interval,
                remaining,
            }),
        );
    }
}
