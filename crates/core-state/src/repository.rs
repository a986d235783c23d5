//! Debounced persistence scheduler.
//!
//! The repository task is the only writer of `state.json`. Mutations
//! mark a domain key dirty; the first mark arms a deadline 500 ms out
//! and later marks within the window coalesce into one write. A failed
//! save keeps the key dirty and re-arms the window, so persistence
//! degrades to retry instead of blocking callers. `flush` forces an
//! immediate write and is awaited during shutdown.

use crate::{save_state, PersistedState};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Debounce window per key.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Independent persistence domains. One file today, but keys debounce
/// separately so a chatty zone edit cannot starve application saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SaveKey {
    Zones,
    Application,
}

impl SaveKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            SaveKey::Zones => "zones",
            SaveKey::Application => "application",
        }
    }
}

enum RepoMsg {
    Dirty(SaveKey),
    Flush(oneshot::Sender<()>),
}

/// Snapshot provider: called at write time so the file always reflects
/// the latest in-memory state, not the state at mark time.
pub type StateProvider = Arc<dyn Fn() -> PersistedState + Send + Sync>;

#[derive(Clone)]
pub struct StateRepository {
    tx: mpsc::UnboundedSender<RepoMsg>,
}

impl StateRepository {
    /// Spawn the repository task. Returns the handle used by services
    /// and the join handle for the task registry.
    pub fn spawn(path: PathBuf, provider: StateProvider) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(path, provider, rx));
        (Self { tx }, handle)
    }

    /// Mark a domain dirty. Never blocks; after shutdown it is a no-op.
    pub fn mark_dirty(&self, key: SaveKey) {
        let _ = self.tx.send(RepoMsg::Dirty(key));
    }

    /// Write pending state immediately and wait for the write to finish.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(RepoMsg::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn run(
    path: PathBuf,
    provider: StateProvider,
    mut rx: mpsc::UnboundedReceiver<RepoMsg>,
) {
    let mut deadlines: BTreeMap<SaveKey, Instant> = BTreeMap::new();
    loop {
        let next_deadline = deadlines.values().min().copied();
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(RepoMsg::Dirty(key)) => {
                    deadlines
                        .entry(key)
                        .or_insert_with(|| Instant::now() + SAVE_DEBOUNCE);
                    debug!(target: "state.store", key = key.as_str(), "save_scheduled");
                }
                Some(RepoMsg::Flush(ack)) => {
                    if !deadlines.is_empty() {
                        write(&path, &provider, &mut deadlines, true);
                    }
                    let _ = ack.send(());
                }
                None => {
                    // channel closed: final flush, then exit
                    if !deadlines.is_empty() {
                        write(&path, &provider, &mut deadlines, true);
                    }
                    info!(target: "state.store", "repository_stopped");
                    return;
                }
            },
            _ = sleep_until_or_forever(next_deadline) => {
                write(&path, &provider, &mut deadlines, false);
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn write(
    path: &std::path::Path,
    provider: &StateProvider,
    deadlines: &mut BTreeMap<SaveKey, Instant>,
    force: bool,
) {
    let now = Instant::now();
    let due: Vec<SaveKey> = deadlines
        .iter()
        .filter(|(_, at)| force || **at <= now)
        .map(|(k, _)| *k)
        .collect();
    if due.is_empty() {
        return;
    }
    match save_state(path, &provider()) {
        Ok(()) => {
            for key in due {
                deadlines.remove(&key);
            }
        }
        Err(e) => {
            // keep keys dirty, retry one debounce window later
            warn!(target: "state.store", error = %e, "state_save_failed_retrying");
            for key in due {
                deadlines.insert(key, now + SAVE_DEBOUNCE);
            }
        }
    }
}
