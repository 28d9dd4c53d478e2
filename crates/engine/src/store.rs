//! DocumentStore: the generic single-writer, file-backed store
//!
//! ## Design
//!
//! One engine, instantiated per [`Entity`]. Each instance exclusively owns
//! its backing JSON file for its whole lifetime.
//!
//! - **Reads** (`get`, `list`, `export_backup`, `check_health`) answer from
//!   the in-memory index and always return owned copies.
//! - **Mutations** (`create`, `update`, `replace`, `delete`,
//!   `import_backup`) take a ticket on the [`WriteQueue`], compute the next
//!   state, persist it with the atomic write protocol, and only then apply
//!   it in memory. A failed write leaves memory exactly as it was.
//! - **Integrity**: if the file was quarantined at open, the first call of
//!   any kind fails with [`StoreError::Integrity`]; every later call
//!   proceeds on the freshly seeded store.
//!
//! ## Thread Safety
//!
//! `DocumentStore` is `Send + Sync`. Share it by reference or `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use parking_lot::{Mutex, RwLock};
use planstore_core::{
    now, ConflictError, Envelope, IntegrityError, Record, RecordId, StoreError, StoreResult,
    ValidationError, Version,
};
use planstore_durability::{
    encode_snapshot, DirSyncCapability, RecoveryCoordinator, RecoverySource, SnapshotWriter,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backup::{prepare_import, BackupEnvelope, ImportSummary};
use crate::database::config::StoreConfig;
use crate::entity::Entity;
use crate::index::{Change, RecordIndex};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::queue::WriteQueue;

/// Options for a single mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Version captured from an earlier read; the write is rejected with a
    /// conflict if the record has changed since
    pub expected_version: Option<Version>,
}

impl WriteOptions {
    /// Unconditional write
    pub fn none() -> Self {
        Self::default()
    }

    /// Write only if the record still has `version`
    pub fn expecting(version: Version) -> Self {
        WriteOptions {
            expected_version: Some(version),
        }
    }
}

/// Store health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Backing file
    pub path: PathBuf,
    /// Records currently stored
    pub record_count: usize,
    /// Next id to be assigned
    pub next_id: RecordId,
}

/// How a store persists its file
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Pretty-print the JSON file
    pub pretty_json: bool,
    /// Directory fsync capability, shared across stores of one process
    pub dir_sync: Arc<DirSyncCapability>,
}

impl StoreOptions {
    /// Options derived from configuration, with a fresh capability probe
    pub fn from_config(config: &StoreConfig) -> Self {
        StoreOptions {
            pretty_json: config.pretty_json,
            dir_sync: if config.sync_directory {
                DirSyncCapability::probing()
            } else {
                DirSyncCapability::disabled()
            },
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

/// Outcome of planning a mutation
enum Planned<F, R> {
    /// Nothing to persist
    Unchanged(R),
    /// Persist `change`, then return `output`
    Apply { change: Change<F>, output: R },
}

/// Generic document store for one entity type
pub struct DocumentStore<E: Entity> {
    path: PathBuf,
    writer: SnapshotWriter,
    pretty: bool,
    index: RwLock<RecordIndex<E>>,
    queue: WriteQueue,
    integrity: Mutex<Option<IntegrityError>>,
    lifecycle: LifecycleCell,
}

impl<E: Entity> DocumentStore<E> {
    /// Open the store backed by `path`
    ///
    /// A missing file is seeded. A corrupt file is quarantined and reseeded;
    /// the store opens anyway and reports the problem on its first call.
    /// Only real I/O failures make opening fail.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = SnapshotWriter::new(options.dir_sync);
        let lifecycle = LifecycleCell::new();

        lifecycle.transition(E::KIND, Lifecycle::Loading);
        let result = RecoveryCoordinator::new(&path, &writer, options.pretty_json).recover(
            |envelope: &Envelope<E::Fields>| {
                envelope.check_structure(|f| E::unique_key(f).map(|k| k.value))
            },
            |_reason| {
                lifecycle.transition(E::KIND, Lifecycle::Quarantine);
            },
        )?;
        lifecycle.transition(E::KIND, Lifecycle::Ready);

        let index = RecordIndex::<E>::from_envelope(result.envelope);
        info!(
            target: "planstore::store",
            kind = E::KIND,
            path = %path.display(),
            records = index.len(),
            next_id = index.next_id(),
            quarantined = result.source == RecoverySource::Quarantined,
            "Store opened"
        );

        Ok(DocumentStore {
            path,
            writer,
            pretty: options.pretty_json,
            index: RwLock::new(index),
            queue: WriteQueue::new(),
            integrity: Mutex::new(result.integrity),
            lifecycle,
        })
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Point lookup
    pub fn get(&self, id: RecordId) -> StoreResult<Option<Record<E::Fields>>> {
        self.take_integrity()?;
        Ok(self.index.read().get(id).cloned())
    }

    /// Records matching `filter`, ascending by sort key then id
    pub fn list(&self, filter: &E::Filter) -> StoreResult<Vec<Record<E::Fields>>> {
        self.take_integrity()?;
        Ok(self.index.read().query(filter))
    }

    /// Deep copy of the whole store in backup form
    pub fn export_backup(&self) -> StoreResult<BackupEnvelope<E::Fields>> {
        self.take_integrity()?;
        let envelope = self.index.read().to_envelope();
        Ok(BackupEnvelope::new::<E>(envelope))
    }

    /// Backup serialized as JSON text
    pub fn export_backup_json(&self, pretty: bool) -> StoreResult<String> {
        let backup = self.export_backup()?;
        let text = if pretty {
            serde_json::to_string_pretty(&backup)?
        } else {
            serde_json::to_string(&backup)?
        };
        Ok(text)
    }

    /// Path, record count and id counter
    pub fn check_health(&self) -> StoreResult<HealthReport> {
        self.take_integrity()?;
        let index = self.index.read();
        Ok(HealthReport {
            path: self.path.clone(),
            record_count: index.len(),
            next_id: index.next_id(),
        })
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a record; assigns the id and stamps both timestamps
    pub fn create(&self, draft: E::Draft) -> StoreResult<Record<E::Fields>> {
        self.commit("create", |index| {
            let fields = E::normalize(draft)?;
            check_unique::<E>(index, &fields, None)?;
            let id = index.next_id();
            if id == RecordId::MAX {
                return Err(StoreError::validation(
                    "id",
                    format!("id space exhausted at nextId {}", id),
                ));
            }
            let stamp = now();
            let record = Record {
                id,
                fields,
                created_at: stamp,
                updated_at: stamp,
            };
            Ok(Planned::Apply {
                output: record.clone(),
                change: Change::Upsert(record),
            })
        })
    }

    /// Apply a partial update
    ///
    /// A patch that changes nothing returns the current record untouched:
    /// no write, same `updatedAt`, same version.
    pub fn update(
        &self,
        id: RecordId,
        patch: E::Patch,
        options: WriteOptions,
    ) -> StoreResult<Record<E::Fields>> {
        self.commit("update", |index| {
            let current = index.get(id).ok_or(StoreError::NotFound(id))?;
            check_expected(current, options.expected_version.as_ref())?;
            let fields = E::apply_patch(&current.fields, patch)?;
            plan_rewrite::<E>(index, current, fields)
        })
    }

    /// Replace all domain fields of a record
    pub fn replace(
        &self,
        id: RecordId,
        draft: E::Draft,
        options: WriteOptions,
    ) -> StoreResult<Record<E::Fields>> {
        self.commit("replace", |index| {
            let fields = E::normalize(draft)?;
            let current = index.get(id).ok_or(StoreError::NotFound(id))?;
            check_expected(current, options.expected_version.as_ref())?;
            plan_rewrite::<E>(index, current, fields)
        })
    }

    /// Delete a record; `false` if it did not exist
    pub fn delete(&self, id: RecordId, options: WriteOptions) -> StoreResult<bool> {
        self.commit("delete", |index| {
            let Some(current) = index.get(id) else {
                return Ok(Planned::Unchanged(false));
            };
            check_expected(current, options.expected_version.as_ref())?;
            Ok(Planned::Apply {
                change: Change::Remove(id),
                output: true,
            })
        })
    }

    /// Replace the entire store with a backup payload
    ///
    /// The payload is fully validated first; on any failure the store is
    /// left exactly as it was.
    pub fn import_backup(&self, payload: Value) -> StoreResult<ImportSummary> {
        self.take_integrity()?;
        let envelope = prepare_import::<E>(payload)?;
        let summary = ImportSummary {
            record_count: envelope.records.len(),
            next_id: envelope.next_id,
        };
        self.commit("import", |_| {
            Ok(Planned::Apply {
                change: Change::ReplaceAll(envelope),
                output: summary,
            })
        })?;
        info!(
            target: "planstore::store",
            kind = E::KIND,
            records = summary.record_count,
            next_id = summary.next_id,
            "Backup imported"
        );
        Ok(summary)
    }

    /// Import a backup from its JSON text
    pub fn import_backup_str(&self, json: &str) -> StoreResult<ImportSummary> {
        let payload: Value = serde_json::from_str(json)
            .map_err(|e| StoreError::validation("backup", format!("invalid JSON: {}", e)))?;
        self.import_backup(payload)
    }

    /// Stop accepting writes and wait for queued ones to finish
    ///
    /// Reads keep answering from memory afterwards. Idempotent.
    pub fn close(&self) -> StoreResult<()> {
        if self.lifecycle.transition(E::KIND, Lifecycle::Closing) {
            self.queue.close();
            self.lifecycle.transition(E::KIND, Lifecycle::Closed);
            info!(target: "planstore::store", kind = E::KIND, path = %self.path.display(), "Store closed");
        } else {
            // Another caller is closing; wait for its drain to finish
            self.queue.close();
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Surface a pending integrity notice exactly once
    fn take_integrity(&self) -> StoreResult<()> {
        match self.integrity.lock().take() {
            Some(err) => {
                warn!(
                    target: "planstore::store",
                    kind = E::KIND,
                    quarantined_to = %err.quarantined_to.display(),
                    "Reporting integrity failure detected at load"
                );
                Err(StoreError::Integrity(err))
            }
            None => Ok(()),
        }
    }

    /// Run one mutation through the write pipeline
    fn commit<R, P>(&self, op: &'static str, plan: P) -> StoreResult<R>
    where
        P: FnOnce(&RecordIndex<E>) -> StoreResult<Planned<E::Fields, R>>,
    {
        if op != "import" {
            self.take_integrity()?;
        }
        if !self.lifecycle().accepts_writes() {
            return Err(self.closed_error());
        }
        let _ticket = self.queue.enter().map_err(|_| self.closed_error())?;

        let planned = plan(&self.index.read())?;
        let (change, output) = match planned {
            Planned::Unchanged(output) => return Ok(output),
            Planned::Apply { change, output } => (change, output),
        };

        {
            let index = self.index.read();
            let bytes = encode_snapshot(&index.preview(&change), self.pretty)?;
            self.writer.write(&self.path, &bytes)?;
        }
        self.index.write().apply(change);

        debug!(target: "planstore::store", kind = E::KIND, op, "Mutation committed");
        Ok(output)
    }

    fn closed_error(&self) -> StoreError {
        StoreError::Closed(self.path.display().to_string())
    }
}

/// Reject if `expected` is given and differs from the record's version
fn check_expected<F: Serialize>(
    current: &Record<F>,
    expected: Option<&Version>,
) -> StoreResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let current_version = current.version()?;
    if &current_version != expected {
        return Err(ConflictError {
            id: current.id,
            expected: expected.clone(),
            current_version,
            current: serde_json::to_value(current)?,
        }
        .into());
    }
    Ok(())
}

/// Reject if another record already holds this record's unique value
fn check_unique<E: Entity>(
    index: &RecordIndex<E>,
    fields: &E::Fields,
    own_id: Option<RecordId>,
) -> StoreResult<()> {
    if let Some(key) = E::unique_key(fields) {
        if let Some(owner) = index.unique_owner(&key.value) {
            if Some(owner) != own_id {
                return Err(ValidationError::new(
                    key.field,
                    format!("'{}' is already taken", key.value),
                )
                .into());
            }
        }
    }
    Ok(())
}

/// Plan an update/replace: unchanged fields mean no write
fn plan_rewrite<E: Entity>(
    index: &RecordIndex<E>,
    current: &Record<E::Fields>,
    fields: E::Fields,
) -> StoreResult<Planned<E::Fields, Record<E::Fields>>> {
    if fields == current.fields {
        return Ok(Planned::Unchanged(current.clone()));
    }
    check_unique::<E>(index, &fields, Some(current.id))?;

    // updatedAt must move even when two writes land in the same millisecond
    let stamp = now().max(current.updated_at + Duration::milliseconds(1));
    let record = Record {
        id: current.id,
        fields,
        created_at: current.created_at,
        updated_at: stamp,
    };
    Ok(Planned::Apply {
        output: record.clone(),
        change: Change::Upsert(record),
    })
}
