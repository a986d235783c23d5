//! In-memory log history for the WebSocket `logs:history` push.
//!
//! A `tracing` layer that keeps the last N formatted events in a ring
//! buffer. Installed alongside the file appender in the binary.

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Events retained for late-joining clients.
pub const LOG_HISTORY_CAP: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: String,
    pub target: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct LogHistory {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn history(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .expect("log history poisoned")
            .iter()
            .cloned()
            .collect()
    }

    fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().expect("log history poisoned");
        if entries.len() == LOG_HISTORY_CAP {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

struct MessageVisitor {
    rendered: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.rendered.is_empty() {
            self.rendered.push(' ');
        }
        if field.name() == "message" {
            let _ = write!(self.rendered, "{value:?}");
        } else {
            let _ = write!(self.rendered, "{}={value:?}", field.name());
        }
    }
}

/// Layer wrapper so the `Arc` stays shareable with the API state.
pub struct LogHistoryLayer {
    history: Arc<LogHistory>,
}

impl LogHistoryLayer {
    pub fn new(history: Arc<LogHistory>) -> Self {
        Self { history }
    }
}

impl<S: Subscriber> Layer<S> for LogHistoryLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // keep the ring at INFO and above; DEBUG/TRACE stay file-only
        if *event.metadata().level() > Level::INFO {
            return;
        }
        let mut visitor = MessageVisitor {
            rendered: String::new(),
        };
        event.record(&mut visitor);
        self.history.push(LogEntry {
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.rendered,
        });
    }
}
