//! Durability layer for planstore
//!
//! This crate handles everything that touches disk:
//!
//! - Atomic replacement of a store file (write, fsync, rename, dir fsync)
//! - Directory-sync capability probing with a one-time downgrade
//! - Loading and classifying store files
//! - Quarantine of corrupted files
//! - Recovery at open: cleanup, load, reseed, quarantine

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod disk_snapshot; // Crash-safe snapshot I/O
pub mod quarantine; // Corrupt file isolation
pub mod recovery; // Open-time recovery

pub use disk_snapshot::{
    encode_snapshot, load_snapshot, DirSyncCapability, LoadOutcome, SnapshotWriter,
};
pub use quarantine::{quarantine, quarantine_path, CORRUPT_MARKER};
pub use recovery::{RecoveryCoordinator, RecoveryResult, RecoverySource};
