//! Core types for planstore
//!
//! This crate defines the foundational types shared by every store:
//! - Record: id + timestamps + flattened entity fields
//! - Envelope: the persisted root (`nextId` + records) and its invariants
//! - Version: content-hash tokens for optimistic concurrency
//! - Error: the store error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod version;

pub use error::{ConflictError, IntegrityError, StoreError, StoreResult, ValidationError};
pub use record::{now, Envelope, EnvelopeRef, Record, RecordId, StructureViolation, Timestamp};
pub use version::{canonicalize, Version};
