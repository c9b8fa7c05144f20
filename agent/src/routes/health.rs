//! Liveness endpoint.
//!
//! Reports local queue state only; connectivity is left to `/sync/status`
//! so a health check never waits on a network probe.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sitesync_engine::Timestamp;

use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub queue_length: usize,
    pub is_syncing: bool,
    pub last_sync: Timestamp,
    pub feed_connections: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (queue_length, last_sync) =
        tokio::join!(state.store.queue_length(), state.store.get_last_sync());

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue_length,
        is_syncing: state.sync.is_syncing(),
        last_sync,
        feed_connections: state.conn_manager.connection_count(),
    })
}
