//! Offline snapshot routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::AppState;

/// Create snapshot routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/snapshots/{collection}", get(get_snapshot).put(store_snapshot))
        .route("/snapshots/{collection}/items", put(upsert_item))
        .route("/snapshots/{collection}/items/{id}", delete(remove_item))
}

/// GET /snapshots/{collection} - Cached entities of a collection.
async fn get_snapshot(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(collection): Path<String>,
) -> Json<Vec<Value>> {
    Json(state.store.get_snapshot(&collection).await)
}

/// PUT /snapshots/{collection} - Replace the cached entities.
async fn store_snapshot(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(collection): Path<String>,
    Json(items): Json<Vec<Value>>,
) -> Result<StatusCode> {
    state.store.store_snapshot(&collection, items).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /snapshots/{collection}/items - Insert or replace one entity by id.
async fn upsert_item(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(collection): Path<String>,
    Json(item): Json<Value>,
) -> Result<StatusCode> {
    if !item.is_object() {
        return Err(AppError::BadRequest("snapshot item must be a JSON object".into()));
    }
    state.store.upsert_snapshot_item(&collection, item).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /snapshots/{collection}/items/{id} - Drop one cached entity.
async fn remove_item(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    if state.store.remove_snapshot_item(&collection, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("{} item {}", collection, id)))
    }
}
