//! Storage maintenance routes.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::AppState;

/// Create storage routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/storage/stats", get(stats))
        .route("/storage", delete(clear_all))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearedResponse {
    removed_keys: usize,
}

/// GET /storage/stats - Item count per cached collection plus the queue.
async fn stats(State(state): State<AppState>, _auth: AuthUser) -> Json<BTreeMap<String, usize>> {
    Json(state.store.get_storage_stats().await)
}

/// DELETE /storage - Wipe the queue, sync metadata and every snapshot.
async fn clear_all(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ClearedResponse>> {
    let removed_keys = state.store.clear_all_offline_data().await?;
    Ok(Json(ClearedResponse { removed_keys }))
}
