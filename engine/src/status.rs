//! Outcome and status types reported to the UI layer.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Message reported when a pass is requested while another is running.
pub const SYNC_IN_PROGRESS: &str = "Sync already in progress";

/// Message reported when a pass finds no connectivity.
pub const NO_CONNECTION: &str = "No internet connection";

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// True when the pass ran and nothing failed
    pub success: bool,
    /// Operations replayed and removed from the queue
    pub synced_operations: usize,
    /// Operations that failed and were rescheduled
    pub failed_operations: usize,
    /// Operations left queued because their collection has no replay yet
    #[serde(default)]
    pub deferred_operations: usize,
    /// One entry per failure
    pub errors: Vec<String>,
}

impl SyncResult {
    /// A pass that did not run, with one explanatory error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![reason.into()],
            ..Self::default()
        }
    }

    pub fn already_in_progress() -> Self {
        Self::rejected(SYNC_IN_PROGRESS)
    }

    pub fn offline() -> Self {
        Self::rejected(NO_CONNECTION)
    }

    /// Start accumulating a pass that is about to run.
    pub fn started() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn record_synced(&mut self) {
        self.synced_operations += 1;
    }

    pub fn record_failed(&mut self, error: impl Into<String>) {
        self.failed_operations += 1;
        self.errors.push(error.into());
        self.success = false;
    }

    pub fn record_deferred(&mut self) {
        self.deferred_operations += 1;
    }

    /// Total operations the pass looked at.
    pub fn attempted(&self) -> usize {
        self.synced_operations + self.failed_operations + self.deferred_operations
    }
}

/// Snapshot of the sync layer for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub queue_length: usize,
    pub last_sync: Timestamp,
    pub is_syncing: bool,
    /// Operations that used up their retries and wait for manual eviction
    pub abandoned_operations: usize,
}
