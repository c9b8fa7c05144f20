//! Per-operation dispatch to remote services.

use std::time::Duration;

use sitesync_engine::{EntityKind, RemoteCall, SyncOperation};

use crate::remote::{RemoteError, ServiceRegistry};

/// Why a single operation could not be replayed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Unknown collection, unknown type or missing entity id.
    #[error(transparent)]
    Invalid(#[from] sitesync_engine::Error),

    /// The collection is recognized but has no replay path yet.
    #[error("{0} sync is not implemented")]
    NotImplemented(EntityKind),

    #[error("No remote service registered for {0}")]
    NoService(EntityKind),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl DispatchError {
    /// Whether the operation should stay queued untouched rather than
    /// count as a failed attempt.
    pub fn is_deferred(&self) -> bool {
        matches!(self, DispatchError::NotImplemented(_))
    }
}

/// Replay one operation against its collection's service.
///
/// The collection is resolved before anything else so that a collection
/// without a replay path is deferred whatever the operation type.
pub async fn dispatch(
    services: &ServiceRegistry,
    op: &SyncOperation,
    timeout: Duration,
) -> Result<(), DispatchError> {
    let kind: EntityKind = op.collection.parse()?;
    if !kind.has_remote() {
        tracing::info!(
            op_id = %op.id,
            collection = %kind,
            "Skipping operation without remote replay"
        );
        return Err(DispatchError::NotImplemented(kind));
    }

    let (kind, call) = op.remote_call()?;
    let service = services.get(kind).ok_or(DispatchError::NoService(kind))?;

    let replay = async {
        match call {
            RemoteCall::Add { entity } => {
                let remote_id = service.add(entity).await?;
                tracing::debug!(op_id = %op.id, remote_id = ?remote_id, "Remote add completed");
            }
            RemoteCall::Update { id, entity } => service.update(&id, entity).await?,
            RemoteCall::Delete { id } => service.delete(&id).await?,
        }
        Ok::<(), DispatchError>(())
    };

    tokio::time::timeout(timeout, replay)
        .await
        .map_err(|_| DispatchError::Timeout(timeout))?
}
