//! Request/response channel between components
//!
//! A component asks a question without knowing who answers it. Handlers are
//! registered per request type and tried in order; the first one that
//! returns a value answers. Answers can be cached per `(type, payload)` for a
//! span of simulated time.

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use serde::Serialize;
use tracing::{trace, warn};

use crate::core::error::{Result, SimError};
use crate::core::types::SimTime;

/// A query that can be sent through the mediator
pub trait MediatorRequest: Serialize {
    /// Routing key; handlers are registered against it
    fn request_type(&self) -> &'static str;
}

/// Request handler. `None` means "not mine", letting the next handler try.
pub type RequestHandler<C, Q, R> = Box<dyn Fn(&C, &Q) -> Option<R>>;

/// Per-request settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOptions {
    pub timeout: Duration,
    /// Simulated time of the request, used for cache freshness
    pub now: SimTime,
    /// Reuse a cached answer younger than this many simulated seconds
    pub cache_for: Option<f64>,
}

impl RequestOptions {
    /// Uncached request
    pub fn fresh(now: SimTime, timeout: Duration) -> Self {
        Self {
            timeout,
            now,
            cache_for: None,
        }
    }

    pub fn cached(mut self, seconds: f64) -> Self {
        self.cache_for = Some(seconds);
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<R> {
    response: R,
    stored_at: SimTime,
}

/// Request router over a context `C`, query type `Q` and response type `R`
pub struct Mediator<C, Q, R> {
    handlers: AHashMap<&'static str, Vec<RequestHandler<C, Q, R>>>,
    cache: RefCell<AHashMap<(&'static str, String), CacheEntry<R>>>,
    next_request: Cell<u64>,
    timeouts: Cell<u64>,
}

impl<C, Q, R> Default for Mediator<C, Q, R> {
    fn default() -> Self {
        Self {
            handlers: AHashMap::new(),
            cache: RefCell::new(AHashMap::new()),
            next_request: Cell::new(1),
            timeouts: Cell::new(0),
        }
    }
}

impl<C, Q, R> std::fmt::Debug for Mediator<C, Q, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("Mediator")
            .field("request_types", &types)
            .field("issued", &(self.next_request.get() - 1))
            .field("timeouts", &self.timeouts.get())
            .finish()
    }
}

impl<C, Q: MediatorRequest, R: Clone> Mediator<C, Q, R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, request_type: &'static str, handler: RequestHandler<C, Q, R>) {
        self.handlers.entry(request_type).or_default().push(handler);
    }

    /// Ask `query` and return the first answer.
    ///
    /// Fails with `RequestTimeout` when no handler answers, or when the
    /// answering chain ran past the deadline.
    pub fn request(&self, ctx: &C, query: &Q, options: RequestOptions) -> Result<R> {
        let request_id = self.next_request.get();
        self.next_request.set(request_id + 1);
        let request_type = query.request_type();

        let cache_key = match options.cache_for {
            Some(max_age) => {
                let key = (request_type, serde_json::to_string(query)?);
                if let Some(entry) = self.cache.borrow().get(&key) {
                    if options.now - entry.stored_at <= max_age {
                        trace!(request_id, request_type, "answered from cache");
                        return Ok(entry.response.clone());
                    }
                }
                Some(key)
            }
            None => None,
        };

        let started = Instant::now();
        let answer = self
            .handlers
            .get(request_type)
            .and_then(|handlers| handlers.iter().find_map(|h| h(ctx, query)));

        let elapsed = started.elapsed();
        let Some(response) = answer else {
            return Err(self.timed_out(request_id, request_type, options.timeout));
        };
        if elapsed > options.timeout {
            return Err(self.timed_out(request_id, request_type, elapsed));
        }

        if let Some(key) = cache_key {
            self.cache.borrow_mut().insert(
                key,
                CacheEntry {
                    response: response.clone(),
                    stored_at: options.now,
                },
            );
        }
        trace!(request_id, request_type, "request answered");
        Ok(response)
    }

    /// Requests issued so far
    pub fn issued(&self) -> u64 {
        self.next_request.get() - 1
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.get()
    }

    fn timed_out(&self, request_id: u64, request_type: &'static str, waited: Duration) -> SimError {
        self.timeouts.set(self.timeouts.get() + 1);
        warn!(request_id, request_type, waited_ms = waited.as_millis() as u64, "request timed out");
        SimError::RequestTimeout {
            request_id,
            request_type,
            waited_ms: waited.as_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    enum Query {
        Double(u32),
        Unanswered,
    }

    impl MediatorRequest for Query {
        fn request_type(&self) -> &'static str {
            match self {
                Query::Double(_) => "double",
                Query::Unanswered => "unanswered",
            }
        }
    }

    struct Ctx {
        calls: Cell<u32>,
    }

    fn options(now: SimTime) -> RequestOptions {
        RequestOptions::fresh(now, Duration::from_millis(5000))
    }

    fn mediator() -> Mediator<Ctx, Query, u32> {
        let mut mediator = Mediator::new();
        mediator.register_handler("double", Box::new(|_: &Ctx, _: &Query| None));
        mediator.register_handler(
            "double",
            Box::new(|ctx: &Ctx, query: &Query| {
                ctx.calls.set(ctx.calls.get() + 1);
                match query {
                    Query::Double(n) => Some(n * 2),
                    Query::Unanswered => None,
                }
            }),
        );
        mediator
    }

    #[test]
    fn test_first_answer_wins() {
        let ctx = Ctx { calls: Cell::new(0) };
        let mediator = mediator();
        assert_eq!(mediator.request(&ctx, &Query::Double(4), options(0.0)).unwrap(), 8);
        assert_eq!(mediator.issued(), 1);
    }

    #[test]
    fn test_unanswered_request_times_out() {
        let ctx = Ctx { calls: Cell::new(0) };
        let mediator = mediator();
        let err = mediator.request(&ctx, &Query::Unanswered, options(0.0)).unwrap_err();
        assert!(matches!(err, SimError::RequestTimeout { request_type: "unanswered", .. }));
        assert_eq!(mediator.timeouts(), 1);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let ctx = Ctx { calls: Cell::new(0) };
        let mediator = mediator();
        let first = mediator.request(&ctx, &Query::Unanswered, options(0.0)).unwrap_err();
        let second = mediator.request(&ctx, &Query::Unanswered, options(0.0)).unwrap_err();
        match (first, second) {
            (
                SimError::RequestTimeout { request_id: a, .. },
                SimError::RequestTimeout { request_id: b, .. },
            ) => assert_ne!(a, b),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cache_respects_simulated_age() {
        let ctx = Ctx { calls: Cell::new(0) };
        let mediator = mediator();

        mediator.request(&ctx, &Query::Double(1), options(0.0).cached(1.0)).unwrap();
        mediator.request(&ctx, &Query::Double(1), options(0.5).cached(1.0)).unwrap();
        assert_eq!(ctx.calls.get(), 1);

        // Different payload, different key
        mediator.request(&ctx, &Query::Double(2), options(0.5).cached(1.0)).unwrap();
        assert_eq!(ctx.calls.get(), 2);

        // Stale entry is recomputed
        mediator.request(&ctx, &Query::Double(1), options(2.0).cached(1.0)).unwrap();
        assert_eq!(ctx.calls.get(), 3);
    }

    #[test]
    fn test_uncached_requests_always_ask() {
        let ctx = Ctx { calls: Cell::new(0) };
        let mediator = mediator();
        mediator.request(&ctx, &Query::Double(1), options(0.0)).unwrap();
        mediator.request(&ctx, &Query::Double(1), options(0.0)).unwrap();
        assert_eq!(ctx.calls.get(), 2);
    }
}
