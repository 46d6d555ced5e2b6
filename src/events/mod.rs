//! Event kernel: the scheduler, the dispatcher and the mediator
//!
//! The scheduler orders future events in simulated time, the dispatcher
//! fans each released event out to subscribers, and the mediator answers
//! queries between components that should not know about each other.

pub mod dispatcher;
pub mod mediator;
pub mod scheduler;
pub mod types;

pub use dispatcher::{EventDispatcher, Handler, Outbox, SubscriptionId};
pub use mediator::{Mediator, MediatorRequest, RequestHandler, RequestOptions};
pub use scheduler::EventScheduler;
pub use types::{priority, CombatEvent, EventKind, ScheduledEvent};
