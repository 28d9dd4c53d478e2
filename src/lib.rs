//! planstore - crash-safe, file-backed document store for training plans
//!
//! One generic single-writer store, instantiated per entity type, backed by
//! one JSON file each. Every mutation is persisted with an atomic
//! write-fsync-rename before it becomes visible in memory; corrupt files are
//! quarantined at open and reported exactly once.
//!
//! # Quick Start
//!
//! ```ignore
//! use planstore::{PlanDraft, PlanFilter, PlanPatch, Stores, WriteOptions};
//!
//! let stores = Stores::open("./data")?;
//! let plans = stores.plans();
//!
//! let plan = plans.create(PlanDraft::new("Tempo run", "2024-01-05", "run"))?;
//! let version = plan.version()?;
//!
//! plans.update(
//!     plan.id,
//!     PlanPatch::new().content("3 x 10 min @ threshold"),
//!     WriteOptions::expecting(version),
//! )?;
//!
//! for plan in plans.list(&PlanFilter::all().category("run"))? {
//!     println!("{} {}", plan.fields.date, plan.fields.title);
//! }
//! ```
//!
//! # Architecture
//!
//! - `planstore-core`: records, envelopes, version tokens, errors
//! - `planstore-durability`: atomic writes, loading, quarantine, recovery
//! - `planstore-engine`: the generic store, index, write queue, backup,
//!   configuration, and the `Plan`/`User` entities

pub use planstore_core::{
    ConflictError, Envelope, IntegrityError, Record, RecordId, StoreError, StoreResult,
    Timestamp, ValidationError, Version,
};
pub use planstore_durability::DirSyncCapability;
pub use planstore_engine::*;
