//! HTTP + WebSocket control surface.
//!
//! JSON over stable paths under `/api`, a push channel at `/ws`, and
//! permissive CORS so a web UI can live anywhere. All mutations route
//! through the same services the local controls use, so the API can
//! never bypass validation or the frame pipeline.

use axum::routing::{get, put};
use axum::Router;
use core_control::{LightingController, Services};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

mod error;
pub mod handlers;
mod logs;
mod ws;

pub use error::ApiError;
pub use logs::{LogEntry, LogHistory, LogHistoryLayer, LOG_HISTORY_CAP};
pub use ws::{PushMessage, PUSH_BUFFER};

#[derive(Clone)]
pub struct ApiState {
    pub services: Services,
    pub lighting: Arc<LightingController>,
    pub logs: Arc<LogHistory>,
    pub push_tx: broadcast::Sender<PushMessage>,
}

impl ApiState {
    pub fn new(
        services: Services,
        lighting: Arc<LightingController>,
        logs: Arc<LogHistory>,
    ) -> Self {
        let (push_tx, _) = broadcast::channel(PUSH_BUFFER);
        let state = Self {
            services,
            lighting,
            logs,
            push_tx,
        };
        ws::spawn_snapshot_broadcaster(&state);
        state
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/zones", get(handlers::list_zones))
        .route("/api/zones/{id}", get(handlers::get_zone))
        .route("/api/zones/{id}/color", put(handlers::put_color))
        .route("/api/zones/{id}/brightness", put(handlers::put_brightness))
        .route("/api/zones/{id}/is-on", put(handlers::put_is_on))
        .route("/api/zones/{id}/render-mode", put(handlers::put_render_mode))
        .route("/api/zones/{id}/animation", put(handlers::put_animation))
        .route(
            "/api/zones/{id}/animation/parameters",
            put(handlers::put_animation_parameters),
        )
        .route("/api/animations", get(handlers::list_animations))
        .route("/api/animations/{id}", get(handlers::get_animation))
        .route("/api/system/tasks", get(handlers::list_tasks))
        .route("/api/system/tasks/active", get(handlers::list_active_tasks))
        .route("/ws", get(ws::ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: ApiState,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "api.http", addr = %addr, "api_listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
