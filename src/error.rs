//! Error types for the notification model.

use thiserror::Error;

use crate::EntityId;

/// Every failure surfaced by the store, the model and the API handler
#[derive(Error, Debug)]
pub enum Error {
    /// The requested record does not exist in the store
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: EntityId },

    /// A record of the wrong variant was handed to an operation bound to another type
    #[error("Unsupported entity type: expected {expected}, got {found}")]
    UnsupportedEntityType {
        expected: &'static str,
        found: String,
    },

    /// Opaque backend failure during save, flush or query
    #[error("Store failure: {0}")]
    StoreFailure(String),

    /// The current principal lacks the named permission
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A record referenced something that has not been persisted yet
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid date unit: {0}")]
    InvalidDateUnit(String),

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    /// Bucket arithmetic left the representable calendar range
    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
