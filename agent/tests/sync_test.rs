//! Integration tests for the queue store and synchronizer.
//!
//! Everything runs against the in-memory store, a manual clock and stub
//! remote services, so no network or database is needed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use sitesync_agent::connectivity::StaticProbe;
use sitesync_agent::kv::{KeyValueStore, MemoryStore, StorageError};
use sitesync_agent::queue_store::{QueueStore, StoreError};
use sitesync_agent::remote::{RemoteError, RemoteService, ServiceRegistry};
use sitesync_agent::sync::Synchronizer;
use sitesync_engine::{EntityKind, ManualClock, OperationDraft, OperationType, RetryPolicy};
use tokio::sync::Notify;

/// 2024-02-01T00:00:00Z
const START: u64 = 1_706_745_600_000;
const SIX_MINUTES: u64 = 6 * 60 * 1000;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Add(Value),
    Update(String, Value),
    Delete(String),
}

/// Records every call; fails them all while `failing` is set.
#[derive(Default)]
struct StubService {
    calls: Mutex<Vec<Call>>,
    failing: AtomicBool,
}

impl StubService {
    fn failing() -> Self {
        let stub = Self::default();
        stub.failing.store(true, Ordering::SeqCst);
        stub
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Rejected("permission denied".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteService for StubService {
    async fn add(&self, entity: &Value) -> Result<Option<String>, RemoteError> {
        self.record(Call::Add(entity.clone()))?;
        Ok(Some("remote-1".into()))
    }

    async fn update(&self, id: &str, entity: &Value) -> Result<(), RemoteError> {
        self.record(Call::Update(id.to_string(), entity.clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.record(Call::Delete(id.to_string()))
    }
}

/// Holds every `add` until released.
#[derive(Default)]
struct GatedService {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RemoteService for GatedService {
    async fn add(&self, _entity: &Value) -> Result<Option<String>, RemoteError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(None)
    }

    async fn update(&self, _id: &str, _entity: &Value) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Backend whose every call fails.
struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disk full".into()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".into()))
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".into()))
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("disk full".into()))
    }

    async fn multi_remove(&self, _keys: &[String]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".into()))
    }
}

/// In-memory store whose next `get` fails once `fail_next_get` is armed.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_next_get: AtomicBool,
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_next_get.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Unavailable("read timed out".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys().await
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError> {
        self.inner.multi_remove(keys).await
    }
}

struct Harness {
    sync: Arc<Synchronizer>,
    store: Arc<QueueStore>,
    kv: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    probe: Arc<StaticProbe>,
}

fn harness(services: ServiceRegistry) -> Harness {
    let kv = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let probe = Arc::new(StaticProbe::new(true));
    let store = Arc::new(QueueStore::new(
        kv.clone(),
        probe.clone(),
        clock.clone(),
        RetryPolicy::default(),
    ));
    let sync = Arc::new(
        Synchronizer::new(store.clone(), services).with_operation_timeout(Duration::from_secs(2)),
    );

    Harness {
        sync,
        store,
        kv,
        clock,
        probe,
    }
}

fn with_employees(stub: Arc<StubService>) -> Harness {
    harness(ServiceRegistry::new().with(EntityKind::Employees, stub))
}

fn asha() -> OperationDraft {
    OperationDraft::create("employees", json!({"id": "e1", "name": "Asha"}))
}

// ==========================================
// Queue store
// ==========================================

#[tokio::test]
async fn enqueue_then_read_back() {
    let h = harness(ServiceRegistry::new());

    let queued = h.store.enqueue(asha()).await.unwrap();
    let queue = h.store.get_queue().await;

    assert_eq!(queue.len(), 1);
    let op = &queue[0];
    assert_eq!(op, &queued);
    assert_eq!(op.op_type, OperationType::Create);
    assert_eq!(op.collection, "employees");
    assert_eq!(op.data, json!({"id": "e1", "name": "Asha"}));
    assert_eq!(op.retry_count, 0);
    assert_eq!(op.timestamp, START);
    assert!(op.id.starts_with(&format!("{}_", START)));
}

#[tokio::test]
async fn ids_unique_within_same_millisecond() {
    let h = harness(ServiceRegistry::new());

    let a = h.store.enqueue(asha()).await.unwrap();
    let b = h.store.enqueue(asha()).await.unwrap();

    assert_eq!(a.timestamp, b.timestamp);
    assert_ne!(a.id, b.id);
    assert_eq!(h.store.queue_length().await, 2);
}

#[tokio::test]
async fn removal_is_idempotent() {
    let h = harness(ServiceRegistry::new());
    let keep = h.store.enqueue(asha()).await.unwrap();
    let gone = h
        .store
        .enqueue(OperationDraft::delete("clients", json!({"id": "c1"})))
        .await
        .unwrap();

    assert!(h.store.remove_from_queue(&gone.id).await.unwrap());
    let after_first = h.store.get_queue().await;

    assert!(!h.store.remove_from_queue(&gone.id).await.unwrap());
    assert_eq!(h.store.get_queue().await, after_first);
    assert_eq!(after_first, vec![keep]);
}

#[tokio::test]
async fn cooldown_gates_retry() {
    let h = harness(ServiceRegistry::new());
    let op = h.store.enqueue(asha()).await.unwrap();

    assert!(h.store.get_retryable_operations().await.is_empty());

    h.clock.advance(SIX_MINUTES);
    let retryable = h.store.get_retryable_operations().await;
    assert_eq!(retryable.len(), 1);
    assert_eq!(retryable[0].id, op.id);
}

#[tokio::test]
async fn exhausted_operations_are_cleared() {
    let h = harness(ServiceRegistry::new());
    let dead = h.store.enqueue(asha()).await.unwrap();
    let alive = h
        .store
        .enqueue(OperationDraft::update("clients", json!({"id": "c1"})))
        .await
        .unwrap();

    for _ in 0..3 {
        assert!(h.store.increment_retry_count(&dead.id).await.unwrap());
    }

    // Long past any cooldown
    h.clock.advance(24 * 60 * 60 * 1000);
    let retryable = h.store.get_retryable_operations().await;
    assert_eq!(retryable.len(), 1);
    assert_eq!(retryable[0].id, alive.id);

    let status = h.sync.get_sync_status().await;
    assert_eq!(status.abandoned_operations, 1);
    assert_eq!(status.queue_length, 2);

    assert_eq!(h.sync.clear_failed_operations().await, 1);
    let queue = h.store.get_queue().await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, alive.id);
    assert_eq!(h.sync.get_sync_status().await.abandoned_operations, 0);
}

#[tokio::test]
async fn snapshot_upsert_replaces() {
    let h = harness(ServiceRegistry::new());

    h.store
        .upsert_snapshot_item("clients", json!({"id": "c1", "name": "X"}))
        .await
        .unwrap();
    h.store
        .upsert_snapshot_item("clients", json!({"id": "c1", "name": "Y"}))
        .await
        .unwrap();

    let snapshot = h.store.get_snapshot("clients").await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["name"], "Y");

    assert!(h.store.remove_snapshot_item("clients", "c1").await.unwrap());
    assert!(h.store.get_snapshot("clients").await.is_empty());
}

#[tokio::test]
async fn clear_all_keeps_foreign_keys() {
    let h = harness(ServiceRegistry::new());
    h.store.enqueue(asha()).await.unwrap();
    h.store.update_last_sync().await.unwrap();
    h.store
        .store_snapshot("vendors", vec![json!({"id": "v1"})])
        .await
        .unwrap();
    h.kv.set("user_session", "token").await.unwrap();

    let removed = h.store.clear_all_offline_data().await.unwrap();
    assert_eq!(removed, 3);

    assert_eq!(h.store.queue_length().await, 0);
    assert_eq!(h.store.get_last_sync().await, 0);
    assert!(h.store.get_snapshot("vendors").await.is_empty());
    assert_eq!(
        h.kv.get("user_session").await.unwrap().as_deref(),
        Some("token")
    );
}

#[tokio::test]
async fn storage_stats_count_snapshots_and_queue() {
    let h = harness(ServiceRegistry::new());
    h.store
        .store_snapshot("clients", vec![json!({"id": "c1"}), json!({"id": "c2"})])
        .await
        .unwrap();
    h.store
        .store_snapshot("materials", vec![json!({"id": "m1"})])
        .await
        .unwrap();
    h.store.enqueue(asha()).await.unwrap();

    let stats = h.store.get_storage_stats().await;
    assert_eq!(stats.get("clients"), Some(&2));
    assert_eq!(stats.get("materials"), Some(&1));
    assert_eq!(stats.get("syncQueue"), Some(&1));
    assert_eq!(stats.len(), 3);
}

#[tokio::test]
async fn broken_storage_degrades() {
    let store = QueueStore::new(
        Arc::new(BrokenStore),
        Arc::new(StaticProbe::new(true)),
        Arc::new(ManualClock::new(START)),
        RetryPolicy::default(),
    );

    assert!(store.get_queue().await.is_empty());
    assert_eq!(store.get_last_sync().await, 0);
    assert!(store.get_snapshot("clients").await.is_empty());
    assert_eq!(store.get_storage_stats().await.get("syncQueue"), Some(&0));

    assert!(matches!(
        store.enqueue(asha()).await,
        Err(StoreError::Storage(StorageError::Unavailable(_)))
    ));
    assert!(store.clear_all_offline_data().await.is_err());
}

#[tokio::test]
async fn failed_read_aborts_write() {
    let kv = Arc::new(FlakyStore::default());
    let store = QueueStore::new(
        kv.clone(),
        Arc::new(StaticProbe::new(true)),
        Arc::new(ManualClock::new(START)),
        RetryPolicy::default(),
    );

    for _ in 0..3 {
        store.enqueue(asha()).await.unwrap();
    }
    let queued = store.get_queue().await;

    kv.fail_next_get.store(true, Ordering::SeqCst);
    assert!(matches!(
        store.enqueue(asha()).await,
        Err(StoreError::Storage(StorageError::Unavailable(_)))
    ));
    assert_eq!(store.get_queue().await, queued);

    kv.fail_next_get.store(true, Ordering::SeqCst);
    assert!(store.remove_from_queue(&queued[0].id).await.is_err());
    assert_eq!(store.queue_length().await, 3);

    store
        .store_snapshot("clients", vec![json!({"id": "c1"}), json!({"id": "c2"})])
        .await
        .unwrap();
    kv.fail_next_get.store(true, Ordering::SeqCst);
    assert!(store
        .upsert_snapshot_item("clients", json!({"id": "c3"}))
        .await
        .is_err());
    assert_eq!(
        store.get_snapshot("clients").await,
        vec![json!({"id": "c1"}), json!({"id": "c2"})]
    );

    // Once storage recovers the write goes through on top of the old queue
    store.enqueue(asha()).await.unwrap();
    assert_eq!(store.queue_length().await, 4);
}

#[tokio::test]
async fn corrupt_queue_reads_empty() {
    let h = harness(ServiceRegistry::new());
    h.kv.set("sync_queue", "{not json").await.unwrap();

    assert!(h.store.get_queue().await.is_empty());

    // The next write starts a fresh queue
    h.store.enqueue(asha()).await.unwrap();
    assert_eq!(h.store.queue_length().await, 1);
}

// ==========================================
// Synchronizer
// ==========================================

#[tokio::test]
async fn sync_replays_create() {
    let stub = Arc::new(StubService::default());
    let h = with_employees(stub.clone());
    h.store.enqueue(asha()).await.unwrap();
    h.clock.advance(SIX_MINUTES);

    let result = h.sync.sync_all().await;

    assert!(result.success);
    assert_eq!(result.synced_operations, 1);
    assert_eq!(result.failed_operations, 0);
    assert!(result.errors.is_empty());
    assert!(h.store.get_queue().await.is_empty());
    assert_eq!(
        stub.calls(),
        vec![Call::Add(json!({"id": "e1", "name": "Asha"}))]
    );
    assert_eq!(h.store.get_last_sync().await, START + SIX_MINUTES);
}

#[tokio::test]
async fn sync_replays_update_and_delete_in_order() {
    let stub = Arc::new(StubService::default());
    let h = with_employees(stub.clone());
    h.store
        .enqueue(OperationDraft::update(
            "employees",
            json!({"id": "e1", "name": "Asha K"}),
        ))
        .await
        .unwrap();
    h.store
        .enqueue(OperationDraft::delete("employees", json!({"id": "e2"})))
        .await
        .unwrap();
    h.clock.advance(SIX_MINUTES);

    let result = h.sync.sync_all().await;

    assert_eq!(result.synced_operations, 2);
    assert_eq!(
        stub.calls(),
        vec![
            Call::Update("e1".into(), json!({"id": "e1", "name": "Asha K"})),
            Call::Delete("e2".into()),
        ]
    );
}

#[tokio::test]
async fn failed_replay_is_rescheduled() {
    let stub = Arc::new(StubService::failing());
    let h = with_employees(stub.clone());
    let op = h.store.enqueue(asha()).await.unwrap();
    h.clock.advance(SIX_MINUTES);

    let result = h.sync.sync_all().await;

    assert!(!result.success);
    assert_eq!(result.failed_operations, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("employees"));
    assert!(result.errors[0].contains("create"));

    let queue = h.store.get_queue().await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, op.id);
    assert_eq!(queue[0].retry_count, 1);
    assert_eq!(queue[0].timestamp, START + SIX_MINUTES);

    // Still cooling down, so an immediate second pass leaves it alone
    let again = h.sync.sync_all().await;
    assert_eq!(again.attempted(), 0);
    assert_eq!(stub.calls().len(), 1);
}

#[tokio::test]
async fn repeated_failures_exhaust_retries() {
    let stub = Arc::new(StubService::failing());
    let h = with_employees(stub.clone());
    h.store.enqueue(asha()).await.unwrap();

    for attempt in 1..=3 {
        h.clock.advance(SIX_MINUTES);
        let result = h.sync.sync_all().await;
        assert_eq!(result.failed_operations, 1, "attempt {}", attempt);
    }

    h.clock.advance(SIX_MINUTES);
    let result = h.sync.sync_all().await;
    assert_eq!(result.attempted(), 0);
    assert_eq!(stub.calls().len(), 3);
    assert_eq!(h.sync.get_sync_status().await.abandoned_operations, 1);
}

#[tokio::test]
async fn unknown_collection_fails_without_panicking() {
    let h = harness(ServiceRegistry::new());
    h.store
        .enqueue(OperationDraft::create("bogus", json!({})))
        .await
        .unwrap();
    h.clock.advance(SIX_MINUTES);

    let result = h.sync.sync_all().await;

    assert_eq!(result.failed_operations, 1);
    assert!(result.errors[0].contains("bogus"));
    assert_eq!(h.store.get_queue().await[0].retry_count, 1);
}

#[tokio::test]
async fn unknown_type_fails() {
    let stub = Arc::new(StubService::default());
    let h = with_employees(stub.clone());
    h.kv.set(
        "sync_queue",
        r#"[{"id":"1_x","type":"upsert","collection":"employees","data":{"id":"e1"},"timestamp":0,"retryCount":0}]"#,
    )
    .await
    .unwrap();

    let result = h.sync.sync_all().await;

    assert_eq!(result.failed_operations, 1);
    assert!(stub.calls().is_empty());
    assert_eq!(h.store.get_queue().await[0].retry_count, 1);
}

#[tokio::test]
async fn missing_entity_id_fails() {
    let stub = Arc::new(StubService::default());
    let h = with_employees(stub.clone());
    h.store
        .enqueue(OperationDraft::delete("employees", json!({"name": "nobody"})))
        .await
        .unwrap();
    h.clock.advance(SIX_MINUTES);

    let result = h.sync.sync_all().await;

    assert_eq!(result.failed_operations, 1);
    assert!(result.errors[0].starts_with("Failed to sync employees delete"));
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn attendance_is_deferred() {
    let h = harness(ServiceRegistry::new());
    let op = h
        .store
        .enqueue(OperationDraft::create("attendance", json!({"id": "a1"})))
        .await
        .unwrap();
    h.clock.advance(SIX_MINUTES);

    let result = h.sync.sync_all().await;

    assert!(result.success);
    assert_eq!(result.deferred_operations, 1);
    assert_eq!(result.synced_operations, 0);
    assert_eq!(result.failed_operations, 0);

    let queue = h.store.get_queue().await;
    assert_eq!(queue, vec![op]);
}

#[tokio::test]
async fn offline_sync_short_circuits() {
    let stub = Arc::new(StubService::default());
    let h = with_employees(stub.clone());
    h.store.enqueue(asha()).await.unwrap();
    h.clock.advance(SIX_MINUTES);
    h.probe.set_online(false);

    let before = h.store.get_queue().await;
    let result = h.sync.sync_all().await;

    assert!(!result.success);
    assert_eq!(result.errors, vec!["No internet connection".to_string()]);
    assert_eq!(h.store.get_queue().await, before);
    assert!(stub.calls().is_empty());
    assert_eq!(h.store.get_last_sync().await, 0);

    assert!(h.sync.auto_sync().await.is_none());

    h.probe.set_online(true);
    let result = h.sync.auto_sync().await.unwrap();
    assert_eq!(result.synced_operations, 1);
}

#[tokio::test]
async fn second_pass_is_rejected_while_running() {
    let gate = Arc::new(GatedService::default());
    let h = harness(ServiceRegistry::new().with(EntityKind::Employees, gate.clone()));
    h.store.enqueue(asha()).await.unwrap();
    h.clock.advance(SIX_MINUTES);

    let sync = h.sync.clone();
    let first = tokio::spawn(async move { sync.sync_all().await });
    gate.entered.notified().await;

    assert!(h.sync.is_syncing());
    assert!(h.sync.get_sync_status().await.is_syncing);
    let before = h.store.get_queue().await;

    let second = h.sync.force_sync().await;
    assert!(!second.success);
    assert_eq!(second.errors, vec!["Sync already in progress".to_string()]);
    assert_eq!(h.store.get_queue().await, before);

    gate.release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.synced_operations, 1);
    assert!(!h.sync.is_syncing());
}

#[tokio::test]
async fn hung_remote_call_times_out() {
    struct Hang;

    #[async_trait]
    impl RemoteService for Hang {
        async fn add(&self, _entity: &Value) -> Result<Option<String>, RemoteError> {
            std::future::pending().await
        }

        async fn update(&self, _id: &str, _entity: &Value) -> Result<(), RemoteError> {
            std::future::pending().await
        }

        async fn delete(&self, _id: &str) -> Result<(), RemoteError> {
            std::future::pending().await
        }
    }

    let h = harness(ServiceRegistry::new());
    let sync = Arc::new(
        Synchronizer::new(
            h.store.clone(),
            ServiceRegistry::new().with(EntityKind::Employees, Arc::new(Hang)),
        )
        .with_operation_timeout(Duration::from_millis(50)),
    );
    h.store.enqueue(asha()).await.unwrap();
    h.clock.advance(SIX_MINUTES);

    let result = sync.sync_all().await;

    assert_eq!(result.failed_operations, 1);
    assert!(result.errors[0].contains("timed out"));
    assert!(!sync.is_syncing());
    assert_eq!(h.store.get_queue().await[0].retry_count, 1);
}

// ==========================================
// Observers
// ==========================================

#[tokio::test]
async fn panicking_callback_does_not_block_others() {
    let h = harness(ServiceRegistry::new());
    let seen = Arc::new(AtomicUsize::new(0));

    h.sync.on_sync_complete(|_| panic!("subscriber bug"));
    let counter = seen.clone();
    h.sync.on_sync_complete(move |result| {
        assert!(result.success);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let result = h.sync.sync_all().await;
    assert!(result.success);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    // The flag was released, so a second pass runs too
    h.sync.sync_all().await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn removed_callback_is_not_called() {
    let h = harness(ServiceRegistry::new());
    let seen = Arc::new(AtomicUsize::new(0));

    let counter = seen.clone();
    let id = h.sync.on_sync_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    h.sync.sync_all().await;
    assert!(h.sync.remove_sync_callback(id));
    h.sync.sync_all().await;

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_pass_does_not_notify() {
    let gate = Arc::new(GatedService::default());
    let h = harness(ServiceRegistry::new().with(EntityKind::Employees, gate.clone()));
    h.store.enqueue(asha()).await.unwrap();
    h.clock.advance(SIX_MINUTES);

    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    h.sync.on_sync_complete(move |result| {
        sink.lock().unwrap().push(result.clone());
    });

    let sync = h.sync.clone();
    let first = tokio::spawn(async move { sync.sync_all().await });
    gate.entered.notified().await;
    h.sync.sync_all().await;
    gate.release.notify_one();
    first.await.unwrap();

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].synced_operations, 1);
}
