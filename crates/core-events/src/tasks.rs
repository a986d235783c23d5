//! Registry of named long-lived tasks.
//!
//! Services register the tasks they spawn (frame loop, animation tasks,
//! pollers, debouncer) so `/api/system/tasks` and the WebSocket `tasks:*`
//! messages can report them without reaching into the runtime.

use serde::Serialize;
use std::sync::Mutex;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::debug;

struct TaskEntry {
    name: String,
    spawned_at: Instant,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub name: String,
    pub active: bool,
    pub uptime_ms: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub finished: usize,
}

#[derive(Default)]
pub struct TaskRegistry {
    entries: Mutex<Vec<TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a spawned task. The registry observes the handle; it never
    /// aborts through it.
    pub fn register(&self, name: impl Into<String>, handle: JoinHandle<()>) {
        let name = name.into();
        debug!(target: "runtime", task = name.as_str(), "task_registered");
        self.entries
            .lock()
            .expect("task registry poisoned")
            .push(TaskEntry {
                name,
                spawned_at: Instant::now(),
                handle,
            });
    }

    pub fn all(&self) -> Vec<TaskInfo> {
        self.entries
            .lock()
            .expect("task registry poisoned")
            .iter()
            .map(|e| TaskInfo {
                name: e.name.clone(),
                active: !e.handle.is_finished(),
                uptime_ms: e.spawned_at.elapsed().as_millis(),
            })
            .collect()
    }

    pub fn active(&self) -> Vec<TaskInfo> {
        self.all().into_iter().filter(|t| t.active).collect()
    }

    pub fn stats(&self) -> TaskStats {
        let all = self.all();
        let active = all.iter().filter(|t| t.active).count();
        TaskStats {
            total: all.len(),
            active,
            finished: all.len() - active,
        }
    }
}
