//! Store lifecycle state machine
//!
//! ```text
//! Uninitialized → Loading → Ready
//!                 Loading → Quarantine → Ready   (one pending integrity notice)
//!                                        Ready → Closing → Closed
//! ```
//!
//! `Closed` is terminal.

use parking_lot::Mutex;
use std::fmt;
use tracing::debug;

/// Lifecycle state of a store instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, nothing read yet
    Uninitialized,
    /// Reading and validating the backing file
    Loading,
    /// Backing file was corrupt; renaming it aside and reseeding
    Quarantine,
    /// Serving reads and writes
    Ready,
    /// Draining the write queue; new writes are rejected
    Closing,
    /// Terminal
    Closed,
}

impl Lifecycle {
    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Uninitialized, Loading)
                | (Loading, Ready)
                | (Loading, Quarantine)
                | (Quarantine, Ready)
                | (Ready, Closing)
                | (Closing, Closed)
        )
    }

    /// Whether writes are accepted in this state
    pub fn accepts_writes(self) -> bool {
        self == Lifecycle::Ready
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Loading => "loading",
            Lifecycle::Quarantine => "quarantine",
            Lifecycle::Ready => "ready",
            Lifecycle::Closing => "closing",
            Lifecycle::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared, logged lifecycle state
#[derive(Debug)]
pub(crate) struct LifecycleCell {
    state: Mutex<Lifecycle>,
}

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        LifecycleCell {
            state: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    pub(crate) fn get(&self) -> Lifecycle {
        *self.state.lock()
    }

    /// Move to `next` if legal; returns whether the state changed
    pub(crate) fn transition(&self, kind: &str, next: Lifecycle) -> bool {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return false;
        }
        let from = *state;
        debug!(target: "planstore::store", kind, from = %from, to = %next, "Lifecycle transition");
        *state = next;
        true
    }
}
