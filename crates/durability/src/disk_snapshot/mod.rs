//! Crash-safe snapshot I/O
//!
//! - [`writer`]: write-fsync-rename replacement of a store file
//! - [`reader`]: loading and classifying a store file

pub mod reader;
pub mod writer;

pub use reader::{encode_snapshot, load_snapshot, LoadOutcome};
pub use writer::{DirSyncCapability, SnapshotWriter};
