//! # SiteSync Engine
//!
//! Deterministic core of the offline write queue used by the SiteSync
//! agent.
//!
//! Writes that cannot reach the remote document store are recorded as
//! [`SyncOperation`]s and replayed later. This crate holds the rules for
//! that replay with no knowledge of storage, network or time sources:
//!
//! - **No IO**: callers pass in stored JSON and the current time
//! - **Deterministic**: the same queue and clock give the same decisions
//! - **Testable**: pure functions over plain data
//!
//! ## Core Concepts
//!
//! ### Operations
//!
//! An [`OperationDraft`] names a collection, a mutation type and a payload.
//! Enqueueing turns it into a [`SyncOperation`] with an id, a timestamp and
//! a retry counter. [`SyncOperation::remote_call`] resolves it into the
//! [`EntityKind`] and [`RemoteCall`] to replay.
//!
//! ### Queue and retries
//!
//! [`SyncQueue`] keeps operations in insertion order. [`RetryPolicy`]
//! decides eligibility: fewer than `max_retries` failures and a cooldown
//! elapsed since the last attempt.
//!
//! ### Offline snapshots
//!
//! [`OfflineSnapshot`] caches the entities of one collection for offline
//! reads, with upsert-by-id for single edits.
//!
//! ## Quick Start
//!
//! ```rust
//! use sitesync_engine::{operation_id, OperationDraft, RetryPolicy, SyncOperation, SyncQueue};
//! use serde_json::json;
//!
//! let now = 1706745600000;
//! let mut queue = SyncQueue::new();
//! queue.push(SyncOperation::from_draft(
//!     operation_id(now, "a1b2c3"),
//!     OperationDraft::create("employees", json!({"id": "e1", "name": "Asha"})),
//!     now,
//! ));
//!
//! let policy = RetryPolicy::default();
//! // Still cooling down right after enqueue...
//! assert!(queue.retryable(&policy, now).is_empty());
//! // ...eligible once the cooldown has passed.
//! assert_eq!(queue.retryable(&policy, now + 6 * 60 * 1000).len(), 1);
//! ```

pub mod clock;
pub mod entity;
pub mod error;
pub mod keys;
pub mod operation;
pub mod queue;
pub mod snapshot;
pub mod status;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock};
pub use entity::EntityKind;
pub use error::Error;
pub use operation::{operation_id, OperationDraft, OperationType, RemoteCall, SyncOperation};
pub use queue::{RetryPolicy, SyncQueue};
pub use snapshot::OfflineSnapshot;
pub use status::{SyncResult, SyncStatus};

/// Type aliases for clarity
pub type OperationId = String;
pub type CollectionName = String;
pub type EntityId = String;
pub type Timestamp = u64;
