//! Durable queue store.
//!
//! Owns every piece of persisted sync state: the pending-operation queue,
//! the last-sync timestamp and the per-collection offline snapshots. Values
//! are whole JSON blobs, so each mutation is a read-modify-write of one key;
//! those cycles are serialized through a single async mutex.
//!
//! Plain reads never fail: a missing, unreadable or corrupt value is logged
//! and treated as empty. Writes report failures through [`StoreError`] and
//! log them as well, so callers that ignore the result still leave a trace.
//! The read half of a write is strict: a storage error aborts the write
//! instead of overwriting the stored value with an empty one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use sitesync_engine::{
    keys, operation_id, Clock, OfflineSnapshot, OperationDraft, RetryPolicy, SyncOperation,
    SyncQueue, Timestamp,
};
use tokio::sync::Mutex;

use crate::connectivity::ConnectivityProbe;
use crate::kv::{KeyValueStore, StorageError};

/// Errors from queue store writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Engine error: {0}")]
    Engine(#[from] sitesync_engine::Error),
}

/// Result type alias for queue store writes.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent home of the sync queue, snapshots and sync metadata.
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
    probe: Arc<dyn ConnectivityProbe>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    write_lock: Mutex<()>,
}

impl QueueStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        probe: Arc<dyn ConnectivityProbe>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            kv,
            probe,
            clock,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    // ==========================================
    // Connectivity
    // ==========================================

    /// Whether the device is connected and can reach the internet.
    ///
    /// A failing probe counts as offline.
    pub async fn is_online(&self) -> bool {
        match self.probe.probe().await {
            Ok(state) => state.is_online(),
            Err(e) => {
                tracing::warn!("Connectivity probe failed, assuming offline: {}", e);
                false
            }
        }
    }

    // ==========================================
    // Sync queue
    // ==========================================

    /// Queue a write for later replay.
    pub async fn enqueue(&self, draft: OperationDraft) -> Result<SyncOperation> {
        let _guard = self.write_lock.lock().await;

        let now = self.now();
        let op = SyncOperation::from_draft(operation_id(now, &id_suffix()), draft, now);

        let mut queue = self.try_load_queue().await?;
        queue.push(op.clone());
        self.save_queue(&queue).await?;

        tracing::debug!(
            op_id = %op.id,
            collection = %op.collection,
            op_type = %op.op_type,
            queue_length = queue.len(),
            "Operation queued"
        );

        Ok(op)
    }

    /// The whole queue in insertion order.
    pub async fn get_queue(&self) -> Vec<SyncOperation> {
        self.load_queue().await.into_operations()
    }

    pub async fn queue_length(&self) -> usize {
        self.load_queue().await.len()
    }

    /// Remove an operation. Returns `false` when it was not queued.
    pub async fn remove_from_queue(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut queue = self.try_load_queue().await?;
        if !queue.remove(id) {
            return Ok(false);
        }
        self.save_queue(&queue).await?;
        Ok(true)
    }

    /// Drop the queue entirely.
    pub async fn clear_queue(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.kv
            .remove(keys::SYNC_QUEUE_KEY)
            .await
            .map_err(|e| logged("clear queue", e.into()))
    }

    /// Operations eligible for replay now, in queue order.
    pub async fn get_retryable_operations(&self) -> Vec<SyncOperation> {
        self.load_queue().await.retryable(&self.policy, self.now())
    }

    /// Record a failed replay: bump the retry count and restart the cooldown.
    pub async fn increment_retry_count(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut queue = self.try_load_queue().await?;
        if !queue.record_failure(id, self.now()) {
            return Ok(false);
        }
        self.save_queue(&queue).await?;
        Ok(true)
    }

    /// Drop every operation that used up its retries.
    pub async fn remove_exhausted(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut queue = self.try_load_queue().await?;
        let removed = queue.remove_exhausted(&self.policy);
        if removed > 0 {
            self.save_queue(&queue).await?;
        }
        Ok(removed)
    }

    /// Number of operations that used up their retries.
    pub async fn exhausted_count(&self) -> usize {
        self.load_queue().await.exhausted_count(&self.policy)
    }

    // ==========================================
    // Sync metadata
    // ==========================================

    /// Last completed sync pass in epoch ms, `0` if never.
    pub async fn get_last_sync(&self) -> Timestamp {
        match self.read(keys::LAST_SYNC_KEY).await {
            Some(raw) => keys::parse_last_sync(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring stored last sync: {}", e);
                0
            }),
            None => 0,
        }
    }

    /// Stamp the current time as the last sync.
    pub async fn update_last_sync(&self) -> Result<Timestamp> {
        let now = self.now();
        self.kv
            .set(keys::LAST_SYNC_KEY, &now.to_string())
            .await
            .map_err(|e| logged("update last sync", e.into()))?;
        Ok(now)
    }

    // ==========================================
    // Offline snapshots
    // ==========================================

    /// Replace the cached entities of a collection.
    pub async fn store_snapshot(&self, collection: &str, items: Vec<Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save_snapshot(collection, &OfflineSnapshot::from_items(items))
            .await
    }

    /// Cached entities of a collection, empty if none.
    pub async fn get_snapshot(&self, collection: &str) -> Vec<Value> {
        self.load_snapshot(collection).await.into_items()
    }

    /// Insert or replace a single cached entity, matched by `id`.
    pub async fn upsert_snapshot_item(&self, collection: &str, item: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = self.try_load_snapshot(collection).await?;
        snapshot.upsert(item);
        self.save_snapshot(collection, &snapshot).await
    }

    /// Drop a cached entity. Returns `false` when it was not cached.
    pub async fn remove_snapshot_item(&self, collection: &str, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = self.try_load_snapshot(collection).await?;
        if !snapshot.remove(id) {
            return Ok(false);
        }
        self.save_snapshot(collection, &snapshot).await?;
        Ok(true)
    }

    // ==========================================
    // Maintenance
    // ==========================================

    /// Remove the queue, the sync metadata and every snapshot in one batch.
    ///
    /// Keys owned by other parts of the application are left alone. Returns
    /// the number of keys removed.
    pub async fn clear_all_offline_data(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let all = self
            .kv
            .keys()
            .await
            .map_err(|e| logged("list keys", e.into()))?;
        let owned: Vec<String> = all.into_iter().filter(|k| keys::is_owned_key(k)).collect();

        self.kv
            .multi_remove(&owned)
            .await
            .map_err(|e| logged("clear offline data", e.into()))?;

        tracing::info!(keys = owned.len(), "Cleared offline data");
        Ok(owned.len())
    }

    /// Cached item count per collection, plus the queue length.
    pub async fn get_storage_stats(&self) -> BTreeMap<String, usize> {
        let mut stats = BTreeMap::new();

        let all = match self.kv.keys().await {
            Ok(all) => all,
            Err(e) => {
                tracing::warn!("Failed to list storage keys: {}", e);
                Vec::new()
            }
        };

        for key in &all {
            if let Some(collection) = keys::snapshot_collection(key) {
                let count = self.load_snapshot(collection).await.len();
                stats.insert(collection.to_string(), count);
            }
        }
        stats.insert(keys::QUEUE_STATS_NAME.to_string(), self.queue_length().await);

        stats
    }

    // ==========================================
    // Internals
    // ==========================================

    async fn read(&self, key: &str) -> Option<String> {
        match self.kv.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, "Storage read failed: {}", e);
                None
            }
        }
    }

    async fn load_queue(&self) -> SyncQueue {
        self.try_load_queue()
            .await
            .unwrap_or_else(|_| SyncQueue::new())
    }

    /// Load the queue for a write. Storage errors propagate; a corrupt blob
    /// still starts a fresh queue.
    async fn try_load_queue(&self) -> Result<SyncQueue> {
        let raw = self
            .kv
            .get(keys::SYNC_QUEUE_KEY)
            .await
            .map_err(|e| logged("read queue", e.into()))?;
        let Some(raw) = raw else {
            return Ok(SyncQueue::new());
        };
        Ok(SyncQueue::from_json(keys::SYNC_QUEUE_KEY, &raw).unwrap_or_else(|e| {
            tracing::error!("Discarding unreadable sync queue: {}", e);
            SyncQueue::new()
        }))
    }

    async fn save_queue(&self, queue: &SyncQueue) -> Result<()> {
        let json = queue
            .to_json(keys::SYNC_QUEUE_KEY)
            .map_err(|e| logged("serialize queue", e.into()))?;
        self.kv
            .set(keys::SYNC_QUEUE_KEY, &json)
            .await
            .map_err(|e| logged("save queue", e.into()))
    }

    async fn load_snapshot(&self, collection: &str) -> OfflineSnapshot {
        self.try_load_snapshot(collection)
            .await
            .unwrap_or_else(|_| OfflineSnapshot::new())
    }

    async fn try_load_snapshot(&self, collection: &str) -> Result<OfflineSnapshot> {
        let key = keys::snapshot_key(collection);
        let raw = self
            .kv
            .get(&key)
            .await
            .map_err(|e| logged("read snapshot", e.into()))?;
        let Some(raw) = raw else {
            return Ok(OfflineSnapshot::new());
        };
        Ok(OfflineSnapshot::from_json(&key, &raw).unwrap_or_else(|e| {
            tracing::error!("Discarding unreadable snapshot: {}", e);
            OfflineSnapshot::new()
        }))
    }

    async fn save_snapshot(&self, collection: &str, snapshot: &OfflineSnapshot) -> Result<()> {
        let key = keys::snapshot_key(collection);
        let json = snapshot
            .to_json(&key)
            .map_err(|e| logged("serialize snapshot", e.into()))?;
        self.kv
            .set(&key, &json)
            .await
            .map_err(|e| logged("save snapshot", e.into()))
    }
}

/// Random suffix for operation ids.
fn id_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}

fn logged(action: &str, err: StoreError) -> StoreError {
    tracing::error!("Failed to {}: {}", action, err);
    err
}
