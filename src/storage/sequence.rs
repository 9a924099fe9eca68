use std::sync::atomic::{AtomicU64, Ordering};

use crate::contracts::StorageError;

/// Hands out audit log sequence numbers.
///
/// Numbers start at 1 and are strictly increasing. A number taken for a
/// commit that then fails is not reused, so the log may have gaps.
pub struct LogSequence {
    counter: AtomicU64,
}

impl LogSequence {
    /// Creates a sequence that continues after `high_watermark`
    /// (0 for an empty log).
    pub fn starting_from(high_watermark: u64) -> Self {
        Self {
            counter: AtomicU64::new(high_watermark),
        }
    }

    /// Returns the next sequence number.
    ///
    /// Once the sequence is exhausted every call fails; numbers never wrap.
    pub fn next(&self) -> Result<u64, StorageError> {
        self.counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(1))
            .map(|prev| prev + 1)
            .map_err(|_| StorageError::InvariantViolation("log sequence overflow".into()))
    }
}
