//! Middleware pipeline around `EventBus::publish`.

use crate::{Event, EventKind};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::trace;

/// Wraps every publish. `before` returning `false` suppresses the event
/// before it reaches history or handlers.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn before(&self, _event: &Event) -> bool {
        true
    }

    fn after(&self, _event: &Event) {}
}

/// Trace-level publish logging.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn before(&self, event: &Event) -> bool {
        trace!(target: "bus", kind = event.kind().as_str(), "publish");
        true
    }
}

/// Per-kind rate limiting for chatty sources. Events of a limited kind
/// arriving within `min_interval` of the previous accepted one are
/// suppressed; unlimited kinds always pass.
pub struct RateLimitMiddleware {
    min_interval: Duration,
    limited: Vec<EventKind>,
    last_accepted: Mutex<HashMap<EventKind, Instant>>,
}

impl RateLimitMiddleware {
    pub fn new(min_interval: Duration, limited: Vec<EventKind>) -> Self {
        Self {
            min_interval,
            limited,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn before(&self, event: &Event) -> bool {
        let kind = event.kind();
        if !self.limited.contains(&kind) {
            return true;
        }
        let now = Instant::now();
        let mut last = self.last_accepted.lock().expect("rate limiter poisoned");
        match last.get(&kind) {
            Some(prev) if now.duration_since(*prev) < self.min_interval => false,
            _ => {
                last.insert(kind, now);
                true
            }
        }
    }
}
