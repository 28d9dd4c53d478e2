//! Recovery coordinator
//!
//! Recovery algorithm:
//! 1. Remove temporary files left by crashed writes
//! 2. Load and classify the store file
//! 3. Missing: seed an empty envelope and persist it
//! 4. Corrupt: quarantine the file, seed and persist an empty envelope,
//!    and report an [`IntegrityError`]
//!
//! # Recovery Properties
//!
//! - **Always usable**: recovery only fails on real I/O errors
//! - **Traceable**: corrupted data is moved aside, never discarded
//! - **Persisted**: the store file exists and is valid when recovery returns

use std::io;
use std::path::{Path, PathBuf};

use planstore_core::{now, Envelope, IntegrityError, StructureViolation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::disk_snapshot::{encode_snapshot, load_snapshot, LoadOutcome, SnapshotWriter};
use crate::quarantine::quarantine;

/// Where the recovered envelope came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySource {
    /// No file existed; a fresh one was seeded
    Fresh,
    /// The existing file was valid
    Existing,
    /// The existing file was corrupt and has been quarantined
    Quarantined,
}

/// Outcome of recovering one store file
#[derive(Debug)]
pub struct RecoveryResult<F> {
    /// The envelope the store should start from
    pub envelope: Envelope<F>,
    /// How it was obtained
    pub source: RecoverySource,
    /// Pending integrity notice when the file was quarantined
    pub integrity: Option<IntegrityError>,
    /// Stale temporary files removed before loading
    pub temp_files_removed: usize,
}

/// Recovery coordinator for a single store file
pub struct RecoveryCoordinator<'a> {
    path: &'a Path,
    writer: &'a SnapshotWriter,
    pretty: bool,
}

impl<'a> RecoveryCoordinator<'a> {
    /// Create a coordinator for `path`, persisting through `writer`
    pub fn new(path: &'a Path, writer: &'a SnapshotWriter, pretty: bool) -> Self {
        RecoveryCoordinator {
            path,
            writer,
            pretty,
        }
    }

    /// Perform recovery
    ///
    /// `check` validates a parsed envelope's invariants. `on_quarantine` is
    /// called with the rejection reason just before the corrupt file is
    /// renamed aside.
    pub fn recover<F, C, Q>(&self, check: C, on_quarantine: Q) -> io::Result<RecoveryResult<F>>
    where
        F: Serialize + DeserializeOwned,
        C: FnOnce(&Envelope<F>) -> Result<(), StructureViolation>,
        Q: FnOnce(&str),
    {
        let temp_files_removed = self.writer.cleanup_temp_files(self.path)?;
        if temp_files_removed > 0 {
            info!(
                target: "planstore::durability",
                path = %self.path.display(),
                count = temp_files_removed,
                "Removed stale temporary files"
            );
        }

        match load_snapshot::<F, C>(self.path, check)? {
            LoadOutcome::Loaded(envelope) => Ok(RecoveryResult {
                envelope,
                source: RecoverySource::Existing,
                integrity: None,
                temp_files_removed,
            }),
            LoadOutcome::Missing => {
                let envelope = self.seed()?;
                info!(
                    target: "planstore::durability",
                    path = %self.path.display(),
                    "Seeded new store file"
                );
                Ok(RecoveryResult {
                    envelope,
                    source: RecoverySource::Fresh,
                    integrity: None,
                    temp_files_removed,
                })
            }
            LoadOutcome::Corrupt { reason } => {
                on_quarantine(&reason);
                let detected_at = now();
                let quarantined_to = quarantine(self.path, detected_at)?;
                warn!(
                    target: "planstore::durability",
                    path = %self.path.display(),
                    quarantined_to = %quarantined_to.display(),
                    reason = %reason,
                    "Store file failed integrity check; quarantined and reseeded"
                );
                let envelope = self.seed()?;
                Ok(RecoveryResult {
                    envelope,
                    source: RecoverySource::Quarantined,
                    integrity: Some(IntegrityError {
                        path: PathBuf::from(self.path),
                        quarantined_to,
                        reason,
                        detected_at,
                    }),
                    temp_files_removed,
                })
            }
        }
    }

    fn seed<F: Serialize>(&self) -> io::Result<Envelope<F>> {
        let envelope = Envelope::empty();
        let bytes = encode_snapshot(&envelope, self.pretty)?;
        self.writer.write(self.path, &bytes)?;
        Ok(envelope)
    }
}
