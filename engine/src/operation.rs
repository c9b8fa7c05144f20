//! Operation types for expressing pending writes.
//!
//! A write that could not reach the backend is recorded as a
//! [`SyncOperation`] and replayed later. The operation only knows *what* to
//! replay; turning it into a concrete call is [`SyncOperation::remote_call`].

use crate::{CollectionName, EntityId, EntityKind, Error, OperationId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of mutation carried by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    /// Anything else found in persisted state. Kept so that one bad entry
    /// does not make the whole queue unreadable.
    #[serde(other)]
    Unknown,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller hands over when queueing a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDraft {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub collection: CollectionName,
    pub data: Value,
}

impl OperationDraft {
    pub fn new(op_type: OperationType, collection: impl Into<CollectionName>, data: Value) -> Self {
        Self {
            op_type,
            collection: collection.into(),
            data,
        }
    }

    pub fn create(collection: impl Into<CollectionName>, data: Value) -> Self {
        Self::new(OperationType::Create, collection, data)
    }

    pub fn update(collection: impl Into<CollectionName>, data: Value) -> Self {
        Self::new(OperationType::Update, collection, data)
    }

    pub fn delete(collection: impl Into<CollectionName>, data: Value) -> Self {
        Self::new(OperationType::Delete, collection, data)
    }
}

/// A pending mutation awaiting replay against the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Operation ID (`<epoch-ms>_<suffix>`)
    pub id: OperationId,
    /// Mutation kind
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Target collection
    pub collection: CollectionName,
    /// Entity payload
    pub data: Value,
    /// Enqueue time, refreshed on every failed attempt
    pub timestamp: Timestamp,
    /// Failed replay attempts so far
    #[serde(default)]
    pub retry_count: u32,
}

/// A concrete remote call derived from an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall<'a> {
    Add { entity: &'a Value },
    Update { id: EntityId, entity: &'a Value },
    Delete { id: EntityId },
}

impl SyncOperation {
    /// Build a fresh operation from a draft.
    pub fn from_draft(id: impl Into<OperationId>, draft: OperationDraft, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            op_type: draft.op_type,
            collection: draft.collection,
            data: draft.data,
            timestamp: now,
            retry_count: 0,
        }
    }

    /// The `id` field of the payload, if any.
    ///
    /// Numeric ids are accepted and rendered as strings.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self.data.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Resolve the operation into its target kind and remote call.
    ///
    /// The collection is checked first, then the type, then the entity id.
    pub fn remote_call(&self) -> Result<(EntityKind, RemoteCall<'_>), Error> {
        let kind: EntityKind = self.collection.parse()?;

        let call = match self.op_type {
            OperationType::Create => RemoteCall::Add { entity: &self.data },
            OperationType::Update => RemoteCall::Update {
                id: self.require_entity_id()?,
                entity: &self.data,
            },
            OperationType::Delete => RemoteCall::Delete {
                id: self.require_entity_id()?,
            },
            OperationType::Unknown => {
                return Err(Error::UnsupportedOperation {
                    collection: self.collection.clone(),
                    op_type: self.op_type.to_string(),
                })
            }
        };

        Ok((kind, call))
    }

    fn require_entity_id(&self) -> Result<EntityId, Error> {
        self.entity_id()
            .ok_or_else(|| Error::MissingEntityId(self.id.clone()))
    }
}

/// Format an operation id from the enqueue time and a random suffix.
pub fn operation_id(now: Timestamp, suffix: &str) -> OperationId {
    format!("{}_{}", now, suffix)
}
