//! Store recovery at open time

mod coordinator;

pub use coordinator::{RecoveryCoordinator, RecoveryResult, RecoverySource};
