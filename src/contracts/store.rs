use crate::contracts::error::StorageError;
use crate::contracts::outcome::{LogEntry, LogRecord};

/// A state transition applied to the store as one atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    /// Insert `value` into the accepted set and make it the last accepted
    /// value. `audit` is appended to the log in the same commit.
    Accept {
        value: u64,
        audit: Option<LogRecord>,
    },
    /// Append one log entry. Accepted set and last accepted are untouched.
    Reject { record: LogRecord },
}

/// Last accepted value and accepted-set size read as one committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateSummary {
    pub last_accepted: Option<u64>,
    pub accepted_count: u64,
}

/// Durable state behind a sequence guard.
///
/// # Invariants
/// - The accepted set only grows; membership is exact
/// - Last accepted is the value of the most recent `Commit::Accept`
/// - `apply` is all-or-nothing: readers never observe half a commit
/// - Log sequences are strictly increasing, starting at 1, across restarts
///
/// Callers serialize `apply` with the reads that decide it; the store only
/// guarantees each call is atomic on its own.
pub trait SequenceStore: Send + Sync {
    /// Returns the last accepted value, or None if nothing was accepted yet.
    fn last_accepted(&self) -> Result<Option<u64>, StorageError>;

    /// Returns true if `value` is in the accepted set.
    fn is_accepted(&self, value: u64) -> Result<bool, StorageError>;

    /// Returns the number of accepted values.
    fn accepted_count(&self) -> Result<u64, StorageError>;

    /// Returns last accepted and accepted count from the same committed
    /// state. Separate `last_accepted` and `accepted_count` calls may
    /// straddle a commit; this may not.
    fn summary(&self) -> Result<StateSummary, StorageError>;

    /// Applies a commit atomically.
    /// Returns the log entry written by the commit, if any.
    fn apply(&self, commit: Commit) -> Result<Option<LogEntry>, StorageError>;

    /// Reads up to `limit` log entries with sequence >= `from_sequence`,
    /// in sequence order.
    fn read_log(&self, from_sequence: u64, limit: usize) -> Result<Vec<LogEntry>, StorageError>;

    /// Returns the highest log sequence written, 0 if the log is empty.
    fn log_high_watermark(&self) -> Result<u64, StorageError>;
}
