//! HTTP route definitions.

mod health;
mod queue;
mod snapshots;
mod storage;
mod sync;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(sync::routes())
        .merge(queue::routes())
        .merge(snapshots::routes())
        .merge(storage::routes())
}
