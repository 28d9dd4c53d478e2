//! Store engine for planstore
//!
//! This crate orchestrates the lower layers:
//! - `DocumentStore<E>`: one generic single-writer store per entity type
//! - Index layer with a cached sorted view
//! - FIFO write queue and store lifecycle
//! - Backup export and validated import
//! - `Stores`: the composition root opening every store of a data directory
//!
//! The engine is the only component that knows about:
//! - Entity definitions (`Plan`, `User`)
//! - Cross-layer coordination (index + atomic writes + quarantine)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod database;
pub mod entity;
pub mod index;
pub mod lifecycle;
pub mod primitives;
pub mod queue;
pub mod store;

pub use backup::{BackupEnvelope, ImportSummary};
pub use database::{StoreConfig, Stores, CONFIG_FILE_NAME};
pub use entity::{Entity, UniqueKey};
pub use index::RecordIndex;
pub use lifecycle::Lifecycle;
pub use primitives::{
    Plan, PlanDraft, PlanFields, PlanFilter, PlanPatch, Role, User, UserDraft, UserFields,
    UserFilter, UserPatch,
};
pub use queue::{QueueClosed, WriteQueue, WriteTicket};
pub use store::{DocumentStore, HealthReport, StoreOptions, WriteOptions};
