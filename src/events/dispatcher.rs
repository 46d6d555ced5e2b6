//! Typed publish/subscribe for combat events
//!
//! Handlers receive the shared context mutably. Anything they want to announce
//! goes into the context's outbox, and `publish` keeps draining the outbox
//! until it is empty, so follow-up notifications are delivered before
//! `publish` returns and before the scheduler releases the next event.

use ahash::AHashSet;
use tracing::{debug, error, warn};

use crate::core::error::{Result, SimError};
use crate::core::types::SimTime;
use crate::events::types::{CombatEvent, EventKind};

/// Upper bound on outbox events drained by a single publish
const MAX_CASCADE: usize = 10_000;

/// Handler callback. Errors are logged and counted, never propagated.
pub type Handler<C> = Box<dyn FnMut(&mut C, SimTime, &CombatEvent) -> Result<()>>;

/// Queue of immediate notifications raised while handling an event
pub trait Outbox {
    fn take_emitted(&mut self) -> Option<(SimTime, CombatEvent)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription<C> {
    id: SubscriptionId,
    /// None listens to every kind
    kind: Option<EventKind>,
    priority: i32,
    once: bool,
    handler: Handler<C>,
}

/// Publish/subscribe hub over a context type `C`
pub struct EventDispatcher<C> {
    /// Sorted by (priority, id)
    subscriptions: Vec<Subscription<C>>,
    next_id: u64,
    handler_errors: u64,
    delivered: u64,
    destroyed: bool,
}

impl<C> Default for EventDispatcher<C> {
    fn default() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 0,
            handler_errors: 0,
            delivered: 0,
            destroyed: false,
        }
    }
}

impl<C> std::fmt::Debug for EventDispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriptions", &self.subscriptions.len())
            .field("handler_errors", &self.handler_errors)
            .field("delivered", &self.delivered)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl<C: Outbox> EventDispatcher<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to one kind of event. Lower priority runs first.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        priority: i32,
        once: bool,
        handler: Handler<C>,
    ) -> SubscriptionId {
        self.add(Some(kind), priority, once, handler)
    }

    /// Listen to every event
    pub fn subscribe_all(&mut self, priority: i32, handler: Handler<C>) -> SubscriptionId {
        self.add(None, priority, false, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Deliver `event`, then every notification it causes.
    ///
    /// Returns the number of handler invocations.
    pub fn publish(&mut self, ctx: &mut C, time: SimTime, event: &CombatEvent) -> Result<usize> {
        if self.destroyed {
            return Err(SimError::DispatcherDestroyed);
        }

        let mut invoked = self.deliver(ctx, time, event);
        invoked += self.drain(ctx);
        Ok(invoked)
    }

    /// Deliver whatever is waiting in the outbox
    pub fn flush(&mut self, ctx: &mut C) -> Result<usize> {
        if self.destroyed {
            return Err(SimError::DispatcherDestroyed);
        }
        Ok(self.drain(ctx))
    }

    fn drain(&mut self, ctx: &mut C) -> usize {
        let mut invoked = 0;
        let mut cascaded = 0;
        while let Some((time, event)) = ctx.take_emitted() {
            cascaded += 1;
            if cascaded > MAX_CASCADE {
                error!(
                    event = event.kind().name(),
                    "notification cascade exceeded {} events, dropping the rest", MAX_CASCADE
                );
                while ctx.take_emitted().is_some() {}
                break;
            }
            invoked += self.deliver(ctx, time, &event);
        }
        invoked
    }

    fn deliver(&mut self, ctx: &mut C, time: SimTime, event: &CombatEvent) -> usize {
        let kind = event.kind();
        let mut finished = AHashSet::new();
        let mut invoked = 0;

        for sub in self.subscriptions.iter_mut() {
            if sub.kind.is_some_and(|k| k != kind) {
                continue;
            }

            invoked += 1;
            if let Err(e) = (sub.handler)(ctx, time, event) {
                self.handler_errors += 1;
                error!(event = kind.name(), time, error = %e, "event handler failed");
            }
            if sub.once {
                finished.insert(sub.id);
            }
        }

        if !finished.is_empty() {
            self.subscriptions.retain(|s| !finished.contains(&s.id));
        }
        self.delivered += 1;
        invoked
    }

    /// Drop every subscription
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    /// Drop every subscription and refuse further publishes
    pub fn destroy(&mut self) {
        debug!(
            delivered = self.delivered,
            errors = self.handler_errors,
            "dispatcher destroyed"
        );
        self.subscriptions.clear();
        self.destroyed = true;
    }

    pub fn handler_errors(&self) -> u64 {
        self.handler_errors
    }

    /// Events delivered, including outbox notifications
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn add(
        &mut self,
        kind: Option<EventKind>,
        priority: i32,
        once: bool,
        handler: Handler<C>,
    ) -> SubscriptionId {
        if self.destroyed {
            warn!("subscribing to a destroyed dispatcher");
        }

        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        // Insert after every subscription with priority <= ours
        let at = self
            .subscriptions
            .partition_point(|s| s.priority <= priority);
        self.subscriptions.insert(
            at,
            Subscription {
                id,
                kind,
                priority,
                once,
                handler,
            },
        );
        id
    }
}
