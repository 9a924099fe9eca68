pub mod error;
pub mod outcome;
pub mod store;

pub use error::{GuardError, LockResultExt, StorageError};
pub use outcome::{
    current_timestamp_ms, EntryKind, LogEntry, LogRecord, Outcome, RejectionKind,
    MAX_SUBMIT_VALUE,
};
pub use store::{Commit, SequenceStore, StateSummary};
