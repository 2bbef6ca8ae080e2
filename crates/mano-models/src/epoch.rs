//! Generation counter for discarding stale asynchronous results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared epoch counter.
///
/// Work started in one epoch carries that epoch's value. Advancing the
/// counter (on session stop or device switch) makes every result stamped
/// with an older value stale.
#[derive(Debug, Clone)]
pub struct Epoch {
    value: Arc<AtomicU64>,
}

impl Epoch {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Current epoch value.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Move to the next epoch and return its value.
    pub fn advance(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether a value stamped with `epoch` is still current.
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.current()
    }

    /// Stamp a value with the current epoch.
    pub fn stamp<T>(&self, inner: T) -> Stamped<T> {
        Stamped {
            epoch: self.current(),
            inner,
        }
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new()
    }
}

/// A value tagged with the epoch it was produced in.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    pub epoch: u64,
    pub inner: T,
}
