//! The single guarded state transition behind `POST /increment`.
//!
//! `SequenceGuard::submit` decides whether a value is accepted and commits
//! the decision to its store while holding one exclusive lock, so concurrent
//! submissions behave as if they ran one after another.

use std::sync::Mutex;

use crate::config::env_bool;
use crate::contracts::{
    Commit, GuardError, LockResultExt, LogEntry, LogRecord, Outcome, RejectionKind,
    SequenceStore, StateSummary, StorageError, MAX_SUBMIT_VALUE,
};

/// Configuration for the guard.
#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    /// Also append an `accepted` entry to the audit log on every accept.
    /// Default: false
    pub log_accepted: bool,
}

impl GuardConfig {
    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `SEQGUARD_LOG_ACCEPTED`: audit accepted values too (default: false)
    pub fn from_env() -> Self {
        Self {
            log_accepted: env_bool("SEQGUARD_LOG_ACCEPTED", false),
        }
    }
}

/// Accepts each value at most once and refuses `last_accepted - 1`.
///
/// # Invariants
/// - Duplicate detection takes precedence over the regression rule
/// - A rejection changes nothing but the audit log
/// - An accept updates the accepted set and last accepted in one commit
/// - Submissions are linearizable: the whole read-check-write runs under
///   one exclusive lock
pub struct SequenceGuard<S: SequenceStore> {
    store: S,
    write_lock: Mutex<()>,
    config: GuardConfig,
}

impl<S: SequenceStore> SequenceGuard<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, GuardConfig::default())
    }

    pub fn with_config(store: S, config: GuardConfig) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Submits `n`.
    ///
    /// Rejections are returned as `Outcome::Rejected`, not as errors. An
    /// error means the store failed and nothing was committed.
    pub fn submit(&self, n: u64) -> Result<Outcome, GuardError> {
        if n > MAX_SUBMIT_VALUE {
            return Err(GuardError::OutOfRange(n));
        }

        let _exclusive = self.write_lock.lock().map_lock_err()?;

        let last = self.store.last_accepted()?;

        if self.store.is_accepted(n)? {
            return self.reject(RejectionKind::Duplicate, n, last);
        }

        // Only the exact predecessor of the last accepted value is refused
        if last.and_then(|l| l.checked_sub(1)) == Some(n) {
            return self.reject(RejectionKind::SequenceViolation, n, last);
        }

        let audit = self
            .config
            .log_accepted
            .then(|| LogRecord::acceptance(n, last));
        self.store.apply(Commit::Accept { value: n, audit })?;

        tracing::debug!(value = n, previous = ?last, "Accepted value");
        Ok(Outcome::accepted(n))
    }

    fn reject(
        &self,
        kind: RejectionKind,
        n: u64,
        last_accepted: Option<u64>,
    ) -> Result<Outcome, GuardError> {
        let record = LogRecord::rejection(kind, n, last_accepted);
        self.store.apply(Commit::Reject { record })?;

        tracing::debug!(
            value = n,
            last_accepted = ?last_accepted,
            kind = kind.code(),
            "Rejected value"
        );
        Ok(Outcome::Rejected {
            kind,
            n,
            last_accepted,
        })
    }

    /// Returns the last accepted value from committed state.
    pub fn last_accepted(&self) -> Result<Option<u64>, StorageError> {
        self.store.last_accepted()
    }

    pub fn is_accepted(&self, n: u64) -> Result<bool, StorageError> {
        self.store.is_accepted(n)
    }

    pub fn accepted_count(&self) -> Result<u64, StorageError> {
        self.store.accepted_count()
    }

    /// Last accepted value and accepted count from one committed state.
    pub fn summary(&self) -> Result<StateSummary, StorageError> {
        self.store.summary()
    }

    /// Reads audit log entries starting at `from_sequence`.
    pub fn read_log(&self, from_sequence: u64, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        self.store.read_log(from_sequence, limit)
    }
}
