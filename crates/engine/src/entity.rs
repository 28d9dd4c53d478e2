//! Entity definitions plugged into the generic store engine
//!
//! One [`DocumentStore`](crate::DocumentStore) implementation serves every
//! entity type. An [`Entity`] supplies what differs between them:
//!
//! - the domain fields and how they are normalized from input
//! - how partial updates apply
//! - the ordering key used by the index's sorted view
//! - list filters and the key range they imply
//! - an optional uniqueness constraint
//! - the backup format discriminators

use planstore_core::ValidationError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Value of an entity's uniqueness constraint for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    /// JSON name of the constrained field
    pub field: &'static str,
    /// Normalized value that must be unique
    pub value: String,
}

/// An entity type stored by the generic engine
pub trait Entity: Send + Sync + 'static {
    /// Short name used in logs and errors
    const KIND: &'static str;

    /// Exact-match backup format identifier
    const BACKUP_FORMAT_ID: &'static str;

    /// Exact-match backup format version
    const BACKUP_VERSION: u32;

    /// Normalized domain fields, flattened into each record
    type Fields: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync;

    /// Full input for create and replace
    type Draft;

    /// Partial input for update
    type Patch;

    /// List filter
    type Filter;

    /// Ordering key of the sorted view (ties break by ascending id)
    type SortKey: Ord + Clone + Debug + Send + Sync;

    /// Validate and normalize a full input
    fn normalize(draft: Self::Draft) -> Result<Self::Fields, ValidationError>;

    /// Apply a partial input on top of the current fields
    fn apply_patch(
        current: &Self::Fields,
        patch: Self::Patch,
    ) -> Result<Self::Fields, ValidationError>;

    /// Re-run the create normalizers over already-stored fields
    ///
    /// Used on backup import; normalized input is returned unchanged.
    fn renormalize(fields: Self::Fields) -> Result<Self::Fields, ValidationError>;

    /// Ordering key of a record
    fn sort_key(fields: &Self::Fields) -> Self::SortKey;

    /// Inclusive key bounds implied by a filter
    fn key_range(_filter: &Self::Filter) -> (Option<Self::SortKey>, Option<Self::SortKey>) {
        (None, None)
    }

    /// Whether a record passes the non-range parts of a filter
    fn matches(_fields: &Self::Fields, _filter: &Self::Filter) -> bool {
        true
    }

    /// Uniqueness constraint value, if the entity has one
    fn unique_key(_fields: &Self::Fields) -> Option<UniqueKey> {
        None
    }
}
