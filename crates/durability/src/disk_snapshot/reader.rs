//! Snapshot reader for recovery
//!
//! Loads and validates a store file. The reader never repairs anything; it
//! classifies the file so recovery can decide what to do:
//!
//! - missing file: a brand-new store
//! - parseable envelope passing the structural check: loaded
//! - anything else (empty, truncated, invalid JSON, wrong shape, broken
//!   invariants): corrupt, with a human-readable reason

use std::fs;
use std::io;
use std::path::Path;

use planstore_core::{Envelope, StructureViolation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::error::Category;

/// Result of reading a store file
#[derive(Debug)]
pub enum LoadOutcome<F> {
    /// No file at the path
    Missing,
    /// A valid envelope
    Loaded(Envelope<F>),
    /// The file exists but cannot be trusted
    Corrupt {
        /// Why it was rejected
        reason: String,
    },
}

impl<F> LoadOutcome<F> {
    /// True for [`LoadOutcome::Corrupt`]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, LoadOutcome::Corrupt { .. })
    }
}

/// Read and classify the file at `path`
///
/// `check` runs the structural invariants on a parsed envelope. Only
/// genuine I/O failures (other than not-found) are returned as errors.
pub fn load_snapshot<F, C>(path: &Path, check: C) -> io::Result<LoadOutcome<F>>
where
    F: DeserializeOwned,
    C: FnOnce(&Envelope<F>) -> Result<(), StructureViolation>,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadOutcome::Missing),
        Err(e) => return Err(e),
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(LoadOutcome::Corrupt {
            reason: "file is empty".to_string(),
        });
    }

    let envelope: Envelope<F> = match serde_json::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            let reason = match e.classify() {
                Category::Syntax | Category::Eof => format!("invalid JSON: {}", e),
                Category::Data | Category::Io => format!("invalid structure: {}", e),
            };
            return Ok(LoadOutcome::Corrupt { reason });
        }
    };

    if let Err(violation) = check(&envelope) {
        return Ok(LoadOutcome::Corrupt {
            reason: violation.to_string(),
        });
    }

    Ok(LoadOutcome::Loaded(envelope))
}

/// Encode a value for writing, with a trailing newline
pub fn encode_snapshot<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<Vec<u8>> {
    let mut bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    bytes.push(b'\n');
    Ok(bytes)
}
