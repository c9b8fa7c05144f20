//! Sync pass and status routes, plus the WebSocket feed.

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sitesync_engine::{SyncResult, SyncStatus};

use crate::auth::AuthUser;
use crate::handlers::handle_websocket_connection;
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(force_sync))
        .route("/sync/status", get(sync_status))
        .route("/ws", get(websocket))
}

/// POST /sync - Run a sync pass now.
async fn force_sync(State(state): State<AppState>, _auth: AuthUser) -> Json<SyncResult> {
    Json(state.sync.force_sync().await)
}

/// GET /sync/status - Current sync status.
async fn sync_status(State(state): State<AppState>, _auth: AuthUser) -> Json<SyncStatus> {
    Json(state.sync.get_sync_status().await)
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    client: Option<String>,
}

/// GET /ws - Upgrade to the sync result feed.
async fn websocket(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let client = query.client.unwrap_or_else(|| "anonymous".to_string());
    ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, state.sync, state.conn_manager, client)
    })
}
