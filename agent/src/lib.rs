//! SiteSync Agent - offline operation queue and synchronizer.
//!
//! Persists pending writes made while the device is offline, replays them
//! against the remote backend once connectivity returns, and keeps a
//! per-collection snapshot cache for offline reads. The application's data
//! layer talks to it over a loopback HTTP API and a WebSocket feed.

pub mod auth;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod handlers;
pub mod kv;
pub mod queue_store;
pub mod remote;
pub mod routes;
pub mod sync;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::queue_store::QueueStore;
use crate::sync::Synchronizer;
use crate::websocket::ConnectionManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<QueueStore>,
    pub sync: Arc<Synchronizer>,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
}

impl AppState {
    /// Build the state and subscribe the WebSocket feed to sync results.
    pub fn new(sync: Arc<Synchronizer>, config: Config) -> Self {
        let conn_manager = ConnectionManager::new_shared();
        conn_manager.forward_sync_results(&sync);

        Self {
            store: Arc::clone(sync.store()),
            sync,
            config: Arc::new(config),
            conn_manager,
        }
    }
}

/// Build the control API router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
