//! Offline snapshots of remote collections.
//!
//! A snapshot is the last known list of entities in one collection, kept
//! so screens can render while disconnected. It is replaced wholesale when
//! fresh data arrives and patched item by item for offline edits.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cached entities of a single collection, in cache order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfflineSnapshot {
    items: Vec<Value>,
}

impl OfflineSnapshot {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn from_items(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// Replace the entry with the same `id`, or append.
    ///
    /// Items without an `id` are always appended.
    pub fn upsert(&mut self, item: Value) {
        let position = item_id(&item).and_then(|id| {
            self.items
                .iter()
                .position(|existing| item_id(existing).as_deref() == Some(id.as_str()))
        });

        match position {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
    }

    /// Drop every entry whose `id` matches. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item_id(item).as_deref() != Some(id));
        self.items.len() != before
    }

    /// Look up an entry by `id`.
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|item| item_id(item).as_deref() == Some(id))
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
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

/// String ids as-is, numeric ids in their decimal form.
fn item_id(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
