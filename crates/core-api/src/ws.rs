//! WebSocket push channel.
//!
//! On connect the server pushes the full zone snapshot set, the task
//! list and the log history; afterwards every zone mutation arrives as
//! a single-zone snapshot. Clients may request task and log refreshes.

use crate::ApiState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use core_events::{Event, EventKind};
use core_model::ZoneSnapshot;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Broadcast queue depth; slow clients drop intermediate snapshots.
pub const PUSH_BUFFER: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PushMessage {
    #[serde(rename = "zones:snapshot")]
    ZonesSnapshot(Vec<ZoneSnapshot>),
    #[serde(rename = "zone:snapshot")]
    ZoneSnapshot(ZoneSnapshot),
    #[serde(rename = "tasks:all")]
    TasksAll(Vec<core_events::TaskInfo>),
    #[serde(rename = "tasks:active")]
    TasksActive(Vec<core_events::TaskInfo>),
    #[serde(rename = "tasks:stats")]
    TasksStats(core_events::TaskStats),
    #[serde(rename = "logs:history")]
    LogsHistory(Vec<crate::LogEntry>),
}

/// Bridge bus snapshots into the broadcast channel. Registered once at
/// startup.
pub fn spawn_snapshot_broadcaster(state: &ApiState) {
    let tx = state.push_tx.clone();
    state.services.bus.subscribe(
        "ws_snapshot_broadcast",
        EventKind::ZoneSnapshotUpdated,
        0,
        move |event| {
            if let Event::ZoneSnapshotUpdated { snapshot } = event {
                // no receivers is fine; send only fails when idle
                let _ = tx.send(PushMessage::ZoneSnapshot(snapshot.clone()));
            }
            Ok(())
        },
    );
}

pub async fn ws_upgrade(State(state): State<ApiState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| client_loop(socket, state))
}

async fn client_loop(mut socket: WebSocket, state: ApiState) {
    debug!(target: "api.ws", "client_connected");
    let hello = [
        PushMessage::ZonesSnapshot(state.services.zones.snapshots()),
        PushMessage::TasksAll(state.services.tasks.all()),
        PushMessage::LogsHistory(state.logs.history()),
    ];
    for message in hello {
        if send(&mut socket, &message).await.is_err() {
            return;
        }
    }

    let mut push_rx = state.push_tx.subscribe();
    loop {
        tokio::select! {
            pushed = push_rx.recv() => match pushed {
                Ok(message) => {
                    if send(&mut socket, &message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(target: "api.ws", skipped, "client_lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_request(&state, &text) {
                        if send(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(target: "api.ws", error = %e, "client_error");
                    break;
                }
            },
        }
    }
    debug!(target: "api.ws", "client_disconnected");
}

fn handle_request(state: &ApiState, text: &str) -> Option<PushMessage> {
    let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
    match parsed.get("type").and_then(|t| t.as_str())? {
        "task_get_all" => Some(PushMessage::TasksAll(state.services.tasks.all())),
        "task_get_active" => Some(PushMessage::TasksActive(state.services.tasks.active())),
        "task_get_stats" => Some(PushMessage::TasksStats(state.services.tasks.stats())),
        "logs_request_history" => Some(PushMessage::LogsHistory(state.logs.history())),
        other => {
            trace!(target: "api.ws", request = other, "unknown_client_request");
            None
        }
    }
}

async fn send(socket: &mut WebSocket, message: &PushMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).unwrap_or_else(|_| {
        json!({"type": "error", "data": "encode failed"}).to_string()
    });
    socket.send(Message::Text(text.into())).await
}
