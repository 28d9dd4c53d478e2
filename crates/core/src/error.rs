//! Error types for planstore
//!
//! Store calls fail with one of three domain kinds, plus generic failures:
//!
//! - [`ValidationError`]: malformed input, rejected before anything changes
//! - [`ConflictError`]: stale expected version, carries the current record
//! - [`IntegrityError`]: on-disk corruption found at load, reported once
//!
//! Lower-level I/O and serialization failures propagate as
//! [`StoreError::Io`] and [`StoreError::Serialization`].

use serde::de::DeserializeOwned;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::record::{Record, RecordId, Timestamp};
use crate::version::Version;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A field value failed normalization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field (JSON name)
    pub field: String,
    /// What was wrong with it
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for a field
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// An expected version did not match the record's current version
#[derive(Debug, Clone, PartialEq, Error)]
#[error("version conflict on record {id}: expected {expected}, current is {current_version}")]
pub struct ConflictError {
    /// Record the caller tried to change
    pub id: RecordId,
    /// Version the caller read earlier
    pub expected: Version,
    /// Version the store holds now
    pub current_version: Version,
    /// The record as the store holds it now
    pub current: serde_json::Value,
}

impl ConflictError {
    /// Decode the attached current record into its typed form
    pub fn current_record<F: DeserializeOwned>(&self) -> Result<Record<F>, serde_json::Error> {
        serde_json::from_value(self.current.clone())
    }
}

/// The backing file was corrupt at load time and has been quarantined
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "integrity failure in {}: {reason} (moved to {})",
    path.display(),
    quarantined_to.display()
)]
pub struct IntegrityError {
    /// The store's backing file
    pub path: PathBuf,
    /// Where the corrupted file now lives
    pub quarantined_to: PathBuf,
    /// Why the file was rejected
    pub reason: String,
    /// When the corruption was detected
    pub detected_at: Timestamp,
}

/// Error types for the document store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed input fields
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Version mismatch on update, replace or delete
    #[error("Conflict: {0}")]
    Conflict(Box<ConflictError>),

    /// Corruption detected at load, surfaced once
    #[error("Integrity error: {0}")]
    Integrity(IntegrityError),

    /// No record with this id
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// The store is closing or closed and accepts no writes
    #[error("Store is closed: {0}")]
    Closed(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (disk full, permission denied, ...)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation(ValidationError::new(field, message))
    }

    /// Create a conflict error
    pub fn conflict(err: ConflictError) -> Self {
        StoreError::Conflict(Box::new(err))
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        StoreError::Config(msg.into())
    }

    /// True for [`StoreError::Validation`]
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }

    /// True for [`StoreError::Conflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// True for [`StoreError::Integrity`]
    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::Integrity(_))
    }

    /// The conflict details, if this is a conflict
    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            StoreError::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

impl From<ConflictError> for StoreError {
    fn from(err: ConflictError) -> Self {
        StoreError::conflict(err)
    }
}

impl From<IntegrityError> for StoreError {
    fn from(err: IntegrityError) -> Self {
        StoreError::Integrity(err)
    }
}
