//! Sync queue routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use sitesync_engine::{OperationDraft, SyncOperation};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::AppState;

/// Create queue routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/queue", get(list).post(enqueue).delete(clear))
        .route("/queue/failed", delete(clear_failed))
        .route("/queue/{id}", delete(remove))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearedResponse {
    removed_operations: usize,
}

/// GET /queue - Every queued operation in order.
async fn list(State(state): State<AppState>, _auth: AuthUser) -> Json<Vec<SyncOperation>> {
    Json(state.store.get_queue().await)
}

/// POST /queue - Queue a write for replay.
async fn enqueue(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(draft): Json<OperationDraft>,
) -> Result<(StatusCode, Json<SyncOperation>)> {
    let op = state.store.enqueue(draft).await?;
    Ok((StatusCode::CREATED, Json(op)))
}

/// DELETE /queue - Drop the whole queue.
async fn clear(State(state): State<AppState>, _auth: AuthUser) -> Result<StatusCode> {
    state.store.clear_queue().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /queue/failed - Evict operations that used up their retries.
async fn clear_failed(State(state): State<AppState>, _auth: AuthUser) -> Json<ClearedResponse> {
    Json(ClearedResponse {
        removed_operations: state.sync.clear_failed_operations().await,
    })
}

/// DELETE /queue/{id} - Remove one operation.
async fn remove(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if state.store.remove_from_queue(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("operation {}", id)))
    }
}
