//! Crash-safe snapshot writer
//!
//! Uses write-fsync-rename pattern for atomic replacement of a store file.
//!
//! # Crash Safety
//!
//! Every write follows this pattern:
//! 1. Write to a uniquely named temporary file (`.{name}.{uuid}.tmp`) in
//!    the target's directory
//! 2. fsync the temporary file
//! 3. Atomic rename onto the target path
//! 4. fsync the parent directory
//!
//! A crash before step 3 leaves the previous file intact; a crash after it
//! leaves the new file intact. No reader can observe a partial file.
//!
//! Some platforms and filesystems cannot fsync a directory. The first such
//! failure downgrades [`DirSyncCapability`] for the rest of the process and
//! logs a single warning; file contents are unaffected.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

#[cfg(target_os = "linux")]
const RAW_UNSUPPORTED: &[i32] = &[21, 22, 95];
#[cfg(target_os = "macos")]
const RAW_UNSUPPORTED: &[i32] = &[21, 22, 45, 102];
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const RAW_UNSUPPORTED: &[i32] = &[];

/// Cached knowledge of whether directory fsync works here.
///
/// Starts out assuming support. Shared between writers with `Arc` so a
/// single process learns the answer once.
#[derive(Debug)]
pub struct DirSyncCapability {
    enabled: AtomicBool,
}

impl DirSyncCapability {
    /// Capability that will attempt directory fsync
    pub fn probing() -> Arc<Self> {
        Arc::new(DirSyncCapability {
            enabled: AtomicBool::new(true),
        })
    }

    /// Capability with directory fsync switched off by configuration
    pub fn disabled() -> Arc<Self> {
        Arc::new(DirSyncCapability {
            enabled: AtomicBool::new(false),
        })
    }

    /// Whether directory fsync will still be attempted
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// fsync a directory so a rename inside it is durable
    pub fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        match File::open(dir).and_then(|d| d.sync_all()) {
            Ok(()) => Ok(()),
            Err(e) => self.handle_sync_error(dir, e),
        }
    }

    /// Downgrade on an "unsupported" failure, propagate anything else.
    pub(crate) fn handle_sync_error(&self, dir: &Path, err: io::Error) -> io::Result<()> {
        if !is_unsupported(&err) {
            return Err(err);
        }
        if self.enabled.swap(false, Ordering::AcqRel) {
            warn!(
                target: "planstore::durability",
                dir = %dir.display(),
                error = %err,
                "Directory fsync is not supported here; renames will not be fsynced from now on"
            );
        }
        Ok(())
    }
}

fn is_unsupported(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Unsupported | io::ErrorKind::InvalidInput | io::ErrorKind::PermissionDenied
    ) || err
        .raw_os_error()
        .is_some_and(|code| RAW_UNSUPPORTED.contains(&code))
}

/// Atomic file replacement with crash-safe semantics
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir_sync: Arc<DirSyncCapability>,
}

impl SnapshotWriter {
    /// Create a writer sharing the given directory-sync capability
    pub fn new(dir_sync: Arc<DirSyncCapability>) -> Self {
        SnapshotWriter { dir_sync }
    }

    /// The directory-sync capability this writer consults
    pub fn dir_sync(&self) -> &Arc<DirSyncCapability> {
        &self.dir_sync
    }

    /// Durably replace `target` with `bytes`
    ///
    /// The process:
    /// 1. Write bytes to a fresh temporary file next to the target
    /// 2. fsync and close it
    /// 3. Rename onto the target (retry once after removing the target if
    ///    the platform refuses to replace it)
    /// 4. fsync the parent directory
    ///
    /// The temporary file never outlives a failed write. The rename is the
    /// commit point: once it succeeds the write returns `Ok`, and a failed
    /// directory fsync is only logged.
    pub fn write(&self, target: &Path, bytes: &[u8]) -> io::Result<()> {
        self.write_with(target, bytes, |dir| self.dir_sync.sync_dir(dir))
    }

    fn write_with<S>(&self, target: &Path, bytes: &[u8], sync_dir: S) -> io::Result<()>
    where
        S: FnOnce(&Path) -> io::Result<()>,
    {
        let dir = parent_dir(target);
        let temp_path = temp_path_for(target);

        if let Err(e) = write_temp(&temp_path, bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = rename_replacing(&temp_path, target) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = sync_dir(&dir) {
            warn!(
                target: "planstore::durability",
                path = %target.display(),
                error = %e,
                "Directory fsync failed after rename; the new contents are in place but may not survive power loss"
            );
        }

        debug!(
            target: "planstore::durability",
            path = %target.display(),
            bytes = bytes.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Remove temporary files a crash left behind for `target`
    ///
    /// Called once when a store opens. Returns how many were removed.
    pub fn cleanup_temp_files(&self, target: &Path) -> io::Result<usize> {
        let dir = parent_dir(target);
        let prefix = temp_prefix(target);
        let mut count = 0;

        if !dir.exists() {
            return Ok(0);
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".tmp") {
                fs::remove_file(entry.path())?;
                count += 1;
            }
        }

        Ok(count)
    }
}

fn write_temp(temp_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    Ok(())
}

fn rename_replacing(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
            ) && to.exists() =>
        {
            fs::remove_file(to)?;
            fs::rename(from, to)
        }
        Err(e) => Err(e),
    }
}

/// Directory containing `path`; `.` for a bare file name
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn temp_prefix(target: &Path) -> String {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!(".{}.", name)
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = format!("{}{}.tmp", temp_prefix(target), Uuid::new_v4().simple());
    parent_dir(target).join(name)
}
