//! The synchronizer.
//!
//! Drains the queue store when the device is online, replays each eligible
//! operation against its collection's remote service, and reschedules
//! failures with bounded retry. Only one pass runs at a time; a second
//! request while a pass is in flight is rejected without touching the
//! queue. Subscribers are notified after every pass that actually started.

mod auto;
mod dispatch;

pub use auto::spawn_auto_sync;
pub use dispatch::{dispatch, DispatchError};

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use sitesync_engine::{SyncOperation, SyncResult, SyncStatus};

use crate::queue_store::QueueStore;
use crate::remote::ServiceRegistry;

/// Default bound on a single remote call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle returned by [`Synchronizer::on_sync_complete`].
pub type CallbackId = u64;

/// Observer invoked with the outcome of every sync pass.
pub type SyncCallback = Arc<dyn Fn(&SyncResult) + Send + Sync>;

/// Replays queued operations against the remote services.
pub struct Synchronizer {
    store: Arc<QueueStore>,
    services: ServiceRegistry,
    operation_timeout: Duration,
    syncing: AtomicBool,
    callbacks: Mutex<Vec<(CallbackId, SyncCallback)>>,
    next_callback_id: AtomicU64,
}

/// Clears the syncing flag when the pass ends, however it ends.
struct SyncingFlag<'a>(&'a AtomicBool);

impl Drop for SyncingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Synchronizer {
    pub fn new(store: Arc<QueueStore>, services: ServiceRegistry) -> Self {
        Self {
            store,
            services,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            syncing: AtomicBool::new(false),
            callbacks: Mutex::new(Vec::new()),
            next_callback_id: AtomicU64::new(1),
        }
    }

    /// Bound every remote call by `timeout`.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    // ==========================================
    // Sync passes
    // ==========================================

    /// Run one sync pass over every retryable operation.
    ///
    /// Never fails: per-operation errors are collected in the result.
    pub async fn sync_all(&self) -> SyncResult {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync requested while a pass is running");
            return SyncResult::already_in_progress();
        }

        let result = {
            let _flag = SyncingFlag(&self.syncing);
            match AssertUnwindSafe(self.run_pass()).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!("Sync pass panicked");
                    SyncResult::rejected("Sync pass aborted unexpectedly")
                }
            }
        };

        self.notify(&result);
        result
    }

    /// Sync only when online. Returns `None` when the device is offline.
    pub async fn auto_sync(&self) -> Option<SyncResult> {
        if !self.store.is_online().await {
            tracing::debug!("Auto sync skipped: offline");
            return None;
        }
        Some(self.sync_all().await)
    }

    /// Sync immediately, at the user's request.
    pub async fn force_sync(&self) -> SyncResult {
        tracing::info!("Manual sync requested");
        self.sync_all().await
    }

    /// Replay a single operation.
    pub async fn sync_operation(&self, op: &SyncOperation) -> Result<(), DispatchError> {
        dispatch(&self.services, op, self.operation_timeout).await
    }

    async fn run_pass(&self) -> SyncResult {
        if !self.store.is_online().await {
            tracing::info!("Sync skipped: no internet connection");
            return SyncResult::offline();
        }

        let operations = self.store.get_retryable_operations().await;
        tracing::info!(operations = operations.len(), "Sync pass started");

        let mut result = SyncResult::started();
        for op in &operations {
            match self.sync_operation(op).await {
                Ok(()) => {
                    // Already replayed; a failed removal only risks a duplicate replay
                    if let Err(e) = self.store.remove_from_queue(&op.id).await {
                        tracing::warn!(op_id = %op.id, "Replayed operation left in queue: {}", e);
                    }
                    result.record_synced();
                }
                Err(e) if e.is_deferred() => {
                    result.record_deferred();
                }
                Err(e) => {
                    let message = format!("Failed to sync {} {}: {}", op.collection, op.op_type, e);
                    tracing::warn!(
                        op_id = %op.id,
                        retry_count = op.retry_count + 1,
                        "{}",
                        message
                    );
                    if let Err(e) = self.store.increment_retry_count(&op.id).await {
                        tracing::warn!(op_id = %op.id, "Failed to reschedule operation: {}", e);
                    }
                    result.record_failed(message);
                }
            }
        }

        if let Err(e) = self.store.update_last_sync().await {
            tracing::warn!("Failed to record last sync: {}", e);
        }

        tracing::info!(
            synced = result.synced_operations,
            failed = result.failed_operations,
            deferred = result.deferred_operations,
            "Sync pass finished"
        );

        result
    }

    // ==========================================
    // Status & maintenance
    // ==========================================

    /// Current state of the sync layer, gathered concurrently.
    pub async fn get_sync_status(&self) -> SyncStatus {
        let (is_online, queue_length, last_sync, abandoned_operations) = tokio::join!(
            self.store.is_online(),
            self.store.queue_length(),
            self.store.get_last_sync(),
            self.store.exhausted_count(),
        );

        SyncStatus {
            is_online,
            queue_length,
            last_sync,
            is_syncing: self.is_syncing(),
            abandoned_operations,
        }
    }

    /// Evict operations that used up their retries. Returns how many.
    pub async fn clear_failed_operations(&self) -> usize {
        match self.store.remove_exhausted().await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(removed, "Cleared failed operations");
                }
                removed
            }
            Err(e) => {
                tracing::error!("Failed to clear failed operations: {}", e);
                0
            }
        }
    }

    // ==========================================
    // Observers
    // ==========================================

    /// Subscribe to pass results.
    pub fn on_sync_complete<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&SyncResult) + Send + Sync + 'static,
    {
        let id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);
        self.lock_callbacks().push((id, Arc::new(callback)));
        id
    }

    /// Unsubscribe. Returns `false` for an unknown id.
    pub fn remove_sync_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.lock_callbacks();
        let before = callbacks.len();
        callbacks.retain(|(cid, _)| *cid != id);
        callbacks.len() != before
    }

    fn notify(&self, result: &SyncResult) {
        // Snapshot so callbacks may (un)subscribe without deadlocking
        let callbacks: Vec<SyncCallback> = self
            .lock_callbacks()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback(result)));
            if outcome.is_err() {
                tracing::error!("Sync callback panicked");
            }
        }
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, Vec<(CallbackId, SyncCallback)>> {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("services", &self.services)
            .field("operation_timeout", &self.operation_timeout)
            .field("is_syncing", &self.is_syncing())
            .finish()
    }
}
