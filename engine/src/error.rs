//! Error types for the SiteSync engine.

use crate::{CollectionName, OperationId};
use thiserror::Error;

/// All possible errors from the SiteSync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Routing errors
    #[error("unknown collection: {0}")]
    UnknownCollection(CollectionName),

    #[error("unsupported operation type for {collection}: {op_type}")]
    UnsupportedOperation {
        collection: CollectionName,
        op_type: String,
    },

    #[error("operation {0} is missing the entity id")]
    MissingEntityId(OperationId),

    // State errors
    #[error("invalid stored value under '{key}': {reason}")]
    InvalidStoredValue { key: String, reason: String },

    #[error("cannot serialize value for '{key}': {reason}")]
    Serialization { key: String, reason: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
