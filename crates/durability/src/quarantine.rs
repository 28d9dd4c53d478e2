//! Quarantine of corrupted store files
//!
//! A corrupted file is never repaired in place or deleted. It is renamed
//! aside to `{file}.corrupt-{YYYYMMDDTHHMMSSmmmZ}` in the same directory so
//! an operator can inspect it, and the store reseeds under the original name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use planstore_core::Timestamp;

/// Marker embedded in every quarantine file name
pub const CORRUPT_MARKER: &str = "corrupt";

/// Quarantine path for `target` at time `at` (no collision handling)
pub fn quarantine_path(target: &Path, at: Timestamp) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stamp = at.format("%Y%m%dT%H%M%S%3fZ");
    target.with_file_name(format!("{}.{}-{}", name, CORRUPT_MARKER, stamp))
}

/// Rename `target` aside and return where it went.
///
/// A numeric suffix is appended if a quarantine file with the same
/// timestamp already exists.
pub fn quarantine(target: &Path, at: Timestamp) -> io::Result<PathBuf> {
    let base = quarantine_path(target, at);
    let mut candidate = base.clone();
    let mut n = 1u32;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{}-{}", base.display(), n));
        n += 1;
    }
    fs::rename(target, &candidate)?;
    Ok(candidate)
}
