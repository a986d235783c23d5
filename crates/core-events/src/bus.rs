//! Priority/filter pub-sub with middleware and handler isolation.
//!
//! Handlers run in descending priority order on the publisher's task.
//! Sync handlers run inline; async handlers are awaited in the same
//! order, so "handler A before handler B" holds regardless of shape.
//! A handler error is logged and counted, never propagated; a
//! cancellation-shaped error is an expected signal and not counted as a
//! failure.

use crate::{Event, EventKind, Middleware};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{trace, warn};

/// Depth of the debugging ring buffer of recent events.
pub const EVENT_HISTORY_CAP: usize = 64;

/// Error surface for handlers. `Cancelled` mirrors cooperative task
/// cancellation and is never treated as a failure.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

type SyncFn = dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync;
type AsyncFn =
    dyn Fn(Event) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>> + Send + Sync;
type FilterFn = dyn Fn(&Event) -> bool + Send + Sync;

enum HandlerFn {
    Sync(Box<SyncFn>),
    Async(Box<AsyncFn>),
}

struct Registration {
    name: &'static str,
    kind: EventKind,
    priority: i32,
    filter: Option<Box<FilterFn>>,
    handler: HandlerFn,
}

#[derive(Debug, Default)]
struct BusMetrics {
    published: AtomicU64,
    suppressed: AtomicU64,
    handled: AtomicU64,
    filtered: AtomicU64,
    handler_errors: AtomicU64,
    handler_cancelled: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusMetricsSnapshot {
    pub published: u64,
    pub suppressed: u64,
    pub handled: u64,
    pub filtered: u64,
    pub handler_errors: u64,
    pub handler_cancelled: u64,
}

#[derive(Default)]
pub struct EventBus {
    /// Kept sorted by priority (descending) at registration time.
    handlers: Mutex<Vec<Arc<Registration>>>,
    middleware: Mutex<Vec<Arc<dyn Middleware>>>,
    history: Mutex<VecDeque<(Instant, Event)>>,
    metrics: BusMetrics,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_middleware(&self, mw: impl Middleware + 'static) {
        self.middleware
            .lock()
            .expect("bus middleware poisoned")
            .push(Arc::new(mw));
    }

    /// Register a synchronous handler.
    pub fn subscribe(
        &self,
        name: &'static str,
        kind: EventKind,
        priority: i32,
        handler: impl Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) {
        self.insert(Registration {
            name,
            kind,
            priority,
            filter: None,
            handler: HandlerFn::Sync(Box::new(handler)),
        });
    }

    /// Register a synchronous handler with a predicate; filtered events
    /// are skipped without counting as handled.
    pub fn subscribe_filtered(
        &self,
        name: &'static str,
        kind: EventKind,
        priority: i32,
        filter: impl Fn(&Event) -> bool + Send + Sync + 'static,
        handler: impl Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) {
        self.insert(Registration {
            name,
            kind,
            priority,
            filter: Some(Box::new(filter)),
            handler: HandlerFn::Sync(Box::new(handler)),
        });
    }

    /// Register a future-returning handler. Awaited inline during
    /// publish, in priority order with the sync handlers.
    pub fn subscribe_async<F, Fut>(
        &self,
        name: &'static str,
        kind: EventKind,
        priority: i32,
        handler: F,
    ) where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.insert(Registration {
            name,
            kind,
            priority,
            filter: None,
            handler: HandlerFn::Async(Box::new(move |ev| Box::pin(handler(ev)))),
        });
    }

    fn insert(&self, reg: Registration) {
        let mut handlers = self.handlers.lock().expect("bus handlers poisoned");
        let at = handlers
            .iter()
            .position(|r| r.priority < reg.priority)
            .unwrap_or(handlers.len());
        trace!(
            target: "bus",
            handler = reg.name,
            kind = reg.kind.as_str(),
            priority = reg.priority,
            "subscribe"
        );
        handlers.insert(at, Arc::new(reg));
    }

    /// Publish one event: middleware pipeline, history, then handlers in
    /// descending priority with per-handler isolation.
    pub async fn publish(&self, event: Event) {
        let middleware: Vec<Arc<dyn Middleware>> = self
            .middleware
            .lock()
            .expect("bus middleware poisoned")
            .clone();
        for mw in &middleware {
            if !mw.before(&event) {
                self.metrics.suppressed.fetch_add(1, Relaxed);
                trace!(
                    target: "bus",
                    middleware = mw.name(),
                    kind = event.kind().as_str(),
                    "event_suppressed"
                );
                return;
            }
        }

        {
            let mut history = self.history.lock().expect("bus history poisoned");
            if history.len() == EVENT_HISTORY_CAP {
                history.pop_front();
            }
            history.push_back((Instant::now(), event.clone()));
        }
        self.metrics.published.fetch_add(1, Relaxed);

        let kind = event.kind();
        let matching: Vec<Arc<Registration>> = {
            let handlers = self.handlers.lock().expect("bus handlers poisoned");
            handlers.iter().filter(|r| r.kind == kind).cloned().collect()
        };

        for reg in matching {
            if let Some(filter) = &reg.filter {
                if !filter(&event) {
                    self.metrics.filtered.fetch_add(1, Relaxed);
                    continue;
                }
            }
            let outcome = match &reg.handler {
                HandlerFn::Sync(f) => f(&event),
                HandlerFn::Async(f) => f(event.clone()).await,
            };
            match outcome {
                Ok(()) => {
                    self.metrics.handled.fetch_add(1, Relaxed);
                }
                Err(HandlerError::Cancelled) => {
                    self.metrics.handler_cancelled.fetch_add(1, Relaxed);
                    trace!(
                        target: "bus",
                        handler = reg.name,
                        kind = kind.as_str(),
                        "handler_cancelled"
                    );
                }
                Err(HandlerError::Failed(err)) => {
                    self.metrics.handler_errors.fetch_add(1, Relaxed);
                    warn!(
                        target: "bus",
                        handler = reg.name,
                        kind = kind.as_str(),
                        error = %err,
                        "handler_failed"
                    );
                }
            }
        }

        for mw in middleware.iter().rev() {
            mw.after(&event);
        }
    }

    /// Most recent events, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.history
            .lock()
            .expect("bus history poisoned")
            .iter()
            .map(|(_, ev)| ev.clone())
            .collect()
    }

    pub fn metrics_snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            published: self.metrics.published.load(Relaxed),
            suppressed: self.metrics.suppressed.load(Relaxed),
            handled: self.metrics.handled.load(Relaxed),
            filtered: self.metrics.filtered.load(Relaxed),
            handler_errors: self.metrics.handler_errors.load(Relaxed),
            handler_cancelled: self.metrics.handler_cancelled.load(Relaxed),
        }
    }
}
