//! Storage key layout.
//!
//! Everything the sync layer persists lives under one of three key shapes:
//! the queue key, the last-sync key and one `offline_<collection>` key per
//! cached collection. Other keys in the same store belong to someone else
//! and are never touched.

use crate::{error::Result, Error, Timestamp};

/// Key holding the serialized sync queue.
pub const SYNC_QUEUE_KEY: &str = "sync_queue";

/// Key holding the last sync time in epoch milliseconds.
pub const LAST_SYNC_KEY: &str = "last_sync";

/// Prefix of per-collection snapshot keys.
pub const SNAPSHOT_PREFIX: &str = "offline_";

/// Name under which the queue length is reported in storage stats.
pub const QUEUE_STATS_NAME: &str = "syncQueue";

/// Snapshot key for a collection.
pub fn snapshot_key(collection: &str) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, collection)
}

/// Collection name of a snapshot key, or `None` for any other key.
pub fn snapshot_collection(key: &str) -> Option<&str> {
    key.strip_prefix(SNAPSHOT_PREFIX)
        .filter(|collection| !collection.is_empty())
}

/// Whether a key belongs to the sync layer.
pub fn is_owned_key(key: &str) -> bool {
    key == SYNC_QUEUE_KEY || key == LAST_SYNC_KEY || snapshot_collection(key).is_some()
}

/// Parse the stored last-sync value.
pub fn parse_last_sync(raw: &str) -> Result<Timestamp> {
    raw.trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| Error::InvalidStoredValue {
            key: LAST_SYNC_KEY.to_string(),
            reason: e.to_string(),
        })
}
