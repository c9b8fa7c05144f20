//! The sync queue and its retry policy.
//!
//! The queue is persisted as a single JSON array, so every mutation here
//! works on the whole in-memory list; the host loads it, calls one of these
//! methods, and writes the result back.

use crate::{error::Result, Error, OperationId, SyncOperation, Timestamp};
use serde::{Deserialize, Serialize};

/// Retry limits applied to queued operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Attempts after which an operation is abandoned
    pub max_retries: u32,
    /// Minimum wait after the last attempt, in milliseconds
    pub cooldown_ms: u64,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_COOLDOWN_MS: u64 = 5 * 60 * 1000;

    pub fn new(max_retries: u32, cooldown_ms: u64) -> Self {
        Self {
            max_retries,
            cooldown_ms,
        }
    }

    /// Whether `op` may be replayed at `now`.
    pub fn is_retryable(&self, op: &SyncOperation, now: Timestamp) -> bool {
        !self.is_exhausted(op) && now.saturating_sub(op.timestamp) > self.cooldown_ms
    }

    /// Whether `op` has used up its retry budget.
    pub fn is_exhausted(&self, op: &SyncOperation) -> bool {
        op.retry_count >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_COOLDOWN_MS)
    }
}

/// Ordered list of pending operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncQueue {
    ops: Vec<SyncOperation>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn from_operations(ops: Vec<SyncOperation>) -> Self {
        Self { ops }
    }

    /// Append an operation at the tail.
    pub fn push(&mut self, op: SyncOperation) {
        self.ops.push(op);
    }

    /// Remove the operation with the given id.
    ///
    /// Returns `false` if no such operation was queued.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ops.len();
        self.ops.retain(|op| op.id != id);
        self.ops.len() != before
    }

    /// Look up an operation by id.
    pub fn get(&self, id: &str) -> Option<&SyncOperation> {
        self.ops.iter().find(|op| op.id == id)
    }

    /// Record a failed attempt: bump the retry count and restart the
    /// cooldown at `now`.
    pub fn record_failure(&mut self, id: &str, now: Timestamp) -> bool {
        match self.ops.iter_mut().find(|op| op.id == id) {
            Some(op) => {
                op.retry_count += 1;
                op.timestamp = now;
                true
            }
            None => false,
        }
    }

    /// Operations eligible for replay at `now`, in queue order.
    pub fn retryable(&self, policy: &RetryPolicy, now: Timestamp) -> Vec<SyncOperation> {
        self.ops
            .iter()
            .filter(|op| policy.is_retryable(op, now))
            .cloned()
            .collect()
    }

    /// Number of operations that have used up their retry budget.
    pub fn exhausted_count(&self, policy: &RetryPolicy) -> usize {
        self.ops.iter().filter(|op| policy.is_exhausted(op)).count()
    }

    /// Drop every exhausted operation and return how many were dropped.
    pub fn remove_exhausted(&mut self, policy: &RetryPolicy) -> usize {
        let before = self.ops.len();
        self.ops.retain(|op| !policy.is_exhausted(op));
        before - self.ops.len()
    }

    pub fn ids(&self) -> Vec<OperationId> {
        self.ops.iter().map(|op| op.id.clone()).collect()
    }

    pub fn operations(&self) -> &[SyncOperation] {
        &self.ops
    }

    pub fn into_operations(self) -> Vec<SyncOperation> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Serialize for storage under `key`.
    pub fn to_json(&self, key: &str) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a stored value read from `key`.
    pub fn from_json(key: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidStoredValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}
