//! Records and the store envelope
//!
//! A [`Record`] wraps an entity's domain fields with the bookkeeping every
//! store shares: a positive integer id and the two timestamps. The
//! [`Envelope`] is the root structure persisted to disk:
//!
//! ```json
//! { "nextId": 3, "records": [ { "id": 1, ... }, { "id": 2, ... } ] }
//! ```
//!
//! ## Invariants
//!
//! - Every id is positive and unique
//! - `nextId` strictly exceeds the largest id
//! - Entity-declared unique keys (e.g. usernames) never repeat

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::version::Version;

/// Record identifier, assigned by the store from `nextId`
pub type RecordId = u64;

/// Wall-clock timestamp, serialized as an ISO-8601 string
pub type Timestamp = DateTime<Utc>;

/// Current time at millisecond precision
///
/// Truncated so the persisted ISO-8601 form and the in-memory value agree
/// with what browser clients produce and parse.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

/// A stored record: id, timestamps, and the entity's domain fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<F> {
    /// Unique positive id
    pub id: RecordId,
    /// Entity-specific fields, flattened into the record object
    #[serde(flatten)]
    pub fields: F,
    /// When the record was created
    pub created_at: Timestamp,
    /// When an observable field last changed
    pub updated_at: Timestamp,
}

impl<F: Serialize> Record<F> {
    /// Content-hash version token of this record's current state
    pub fn version(&self) -> Result<Version, serde_json::Error> {
        Version::of(self)
    }
}

/// Root on-disk and in-memory structure of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<F> {
    /// Next id to assign
    pub next_id: RecordId,
    /// All records
    pub records: Vec<Record<F>>,
}

impl<F> Envelope<F> {
    /// A freshly seeded envelope
    pub fn empty() -> Self {
        Envelope {
            next_id: 1,
            records: Vec::new(),
        }
    }

    /// Largest id present, or 0 for an empty envelope
    pub fn max_id(&self) -> RecordId {
        self.records.iter().map(|r| r.id).max().unwrap_or(0)
    }

    /// Check the structural invariants of a loaded or imported envelope.
    ///
    /// `unique_key` returns the value of the entity's uniqueness constraint
    /// for a record, or `None` when the entity has none.
    pub fn check_structure<K>(&self, unique_key: K) -> Result<(), StructureViolation>
    where
        K: Fn(&F) -> Option<String>,
    {
        let mut seen_ids: HashSet<RecordId> = HashSet::with_capacity(self.records.len());
        let mut seen_keys: HashMap<String, RecordId> = HashMap::new();

        for record in &self.records {
            if record.id == 0 {
                return Err(StructureViolation::NonPositiveId);
            }
            if !seen_ids.insert(record.id) {
                return Err(StructureViolation::DuplicateId(record.id));
            }
            if let Some(key) = unique_key(&record.fields) {
                if let Some(first) = seen_keys.insert(key.clone(), record.id) {
                    return Err(StructureViolation::DuplicateKey {
                        key,
                        first,
                        second: record.id,
                    });
                }
            }
        }

        let max_id = self.max_id();
        if self.next_id <= max_id {
            return Err(StructureViolation::NextIdTooSmall {
                next_id: self.next_id,
                max_id,
            });
        }
        Ok(())
    }
}

impl<F> Default for Envelope<F> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Borrowed view of an envelope, used to serialize without cloning records
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeRef<'a, F> {
    /// Next id to assign
    pub next_id: RecordId,
    /// Records in the order they should be written
    pub records: Vec<&'a Record<F>>,
}

/// A broken envelope invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureViolation {
    /// A record carries id 0
    #[error("record ids must be positive integers")]
    NonPositiveId,

    /// Two records share an id
    #[error("duplicate record id {0}")]
    DuplicateId(RecordId),

    /// Two records share a value that must be unique
    #[error("duplicate unique key '{key}' on records {first} and {second}")]
    DuplicateKey {
        /// The repeated key
        key: String,
        /// Id of the first record holding it
        first: RecordId,
        /// Id of the second record holding it
        second: RecordId,
    },

    /// The id counter does not exceed the largest id
    #[error("nextId {next_id} must exceed the largest record id {max_id}")]
    NextIdTooSmall {
        /// Declared next id
        next_id: RecordId,
        /// Largest id present
        max_id: RecordId,
    },
}
