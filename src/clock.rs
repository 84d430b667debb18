//! Lamport Clock
//!
//! Process-wide logical clock shared by every connection.
//!
//! ## Rules
//! - `tick()`: value += 1, returns the new value (sending a response)
//! - `observe(remote)`: value = max(value, remote) + 1 (receiving a request)
//!
//! Any value read after observing a message is strictly greater than the
//! stamp that message carried.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free Lamport clock
#[derive(Debug, Default)]
pub struct LamportClock {
    value: AtomicU64,
}

impl LamportClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock resuming from a previously observed value
    pub fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Advance by one for a local event and return the new value
    pub fn tick(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Merge a remote stamp and return the new value
    pub fn observe(&self, remote: u64) -> u64 {
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.max(remote) + 1)
            })
            .unwrap_or_else(|current| current);

        previous.max(remote) + 1
    }

    /// Current value without advancing
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}
