//! Remote entity services.
//!
//! Each collection in the remote document store is reached through a
//! [`RemoteService`] exposing `add`, `update` and `delete`. The
//! [`ServiceRegistry`] maps entity kinds to their service for dispatch.

mod http;

pub use http::RestService;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sitesync_engine::{EntityId, EntityKind};

/// Errors raised by a remote service call.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// CRUD access to one remote collection.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Create a record from `entity`, which carries its own client id.
    /// Returns the id assigned by the backend, if it reports one.
    async fn add(&self, entity: &Value) -> Result<Option<EntityId>, RemoteError>;

    /// Overwrite the record identified by `id`.
    async fn update(&self, id: &str, entity: &Value) -> Result<(), RemoteError>;

    /// Remove the record identified by `id`.
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Remote services keyed by entity kind.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<EntityKind, Arc<dyn RemoteService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Register (or replace) the service for a kind.
    pub fn register(&mut self, kind: EntityKind, service: Arc<dyn RemoteService>) {
        self.services.insert(kind, service);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, kind: EntityKind, service: Arc<dyn RemoteService>) -> Self {
        self.register(kind, service);
        self
    }

    pub fn get(&self, kind: EntityKind) -> Option<&Arc<dyn RemoteService>> {
        self.services.get(&kind)
    }

    /// One REST service per kind that replays remotely, all on `base_url`.
    pub fn rest(client: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        let mut registry = Self::new();
        for kind in EntityKind::ALL.into_iter().filter(|k| k.has_remote()) {
            let service = RestService::new(client.clone(), base_url, kind.as_str(), token.clone());
            registry.register(kind, Arc::new(service));
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.services.keys().collect();
        kinds.sort();
        f.debug_struct("ServiceRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
