use std::collections::HashSet;
use std::sync::RwLock;

use crate::contracts::{
    Commit, LockResultExt, LogEntry, SequenceStore, StateSummary, StorageError,
};

#[derive(Default)]
struct MemoryState {
    accepted: HashSet<u64>,
    last_accepted: Option<u64>,
    log: Vec<LogEntry>,
}

/// In-process store with no durability.
///
/// Each commit is applied under one write lock, so it has the same
/// all-or-nothing visibility as the RocksDB store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceStore for MemoryStore {
    fn last_accepted(&self) -> Result<Option<u64>, StorageError> {
        Ok(self.state.read().map_lock_err()?.last_accepted)
    }

    fn is_accepted(&self, value: u64) -> Result<bool, StorageError> {
        Ok(self.state.read().map_lock_err()?.accepted.contains(&value))
    }

    fn accepted_count(&self) -> Result<u64, StorageError> {
        Ok(self.state.read().map_lock_err()?.accepted.len() as u64)
    }

    fn summary(&self) -> Result<StateSummary, StorageError> {
        let state = self.state.read().map_lock_err()?;
        Ok(StateSummary {
            last_accepted: state.last_accepted,
            accepted_count: state.accepted.len() as u64,
        })
    }

    fn apply(&self, commit: Commit) -> Result<Option<LogEntry>, StorageError> {
        let mut state = self.state.write().map_lock_err()?;

        let record = match commit {
            Commit::Accept { value, audit } => {
                if !state.accepted.insert(value) {
                    return Err(StorageError::InvariantViolation(format!(
                        "value {} is already accepted",
                        value
                    )));
                }
                state.last_accepted = Some(value);
                audit
            }
            Commit::Reject { record } => Some(record),
        };

        Ok(record.map(|record| {
            let entry = record.into_entry(state.log.len() as u64 + 1);
            state.log.push(entry.clone());
            entry
        }))
    }

    fn read_log(&self, from_sequence: u64, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        let state = self.state.read().map_lock_err()?;
        // Sequences are dense here: entry i has sequence i + 1
        let start = from_sequence.saturating_sub(1) as usize;
        Ok(state.log.iter().skip(start).take(limit).cloned().collect())
    }

    fn log_high_watermark(&self) -> Result<u64, StorageError> {
        Ok(self.state.read().map_lock_err()?.log.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{LogRecord, RejectionKind};

    #[test]
    fn accept_and_reject_commits() {
        let store = MemoryStore::new();
        store
            .apply(Commit::Accept {
                value: 5,
                audit: None,
            })
            .unwrap();
        let entry = store
            .apply(Commit::Reject {
                record: LogRecord::rejection(RejectionKind::Duplicate, 5, Some(5)),
            })
            .unwrap()
            .unwrap();

        assert_eq!(entry.sequence, 1);
        assert_eq!(store.last_accepted().unwrap(), Some(5));
        assert_eq!(store.accepted_count().unwrap(), 1);
        assert_eq!(store.log_high_watermark().unwrap(), 1);
    }

    #[test]
    fn double_accept_leaves_state_untouched() {
        let store = MemoryStore::new();
        store
            .apply(Commit::Accept {
                value: 1,
                audit: None,
            })
            .unwrap();
        store
            .apply(Commit::Accept {
                value: 2,
                audit: None,
            })
            .unwrap();

        let err = store
            .apply(Commit::Accept {
                value: 1,
                audit: Some(LogRecord::acceptance(1, Some(2))),
            })
            .unwrap_err();

        assert!(matches!(err, StorageError::InvariantViolation(_)));
        assert_eq!(store.last_accepted().unwrap(), Some(2));
        assert_eq!(store.log_high_watermark().unwrap(), 0);
    }

    #[test]
    fn summary_reads_one_state() {
        let store = MemoryStore::new();
        assert_eq!(store.summary().unwrap(), StateSummary::default());

        for value in [3, 8] {
            store.apply(Commit::Accept { value, audit: None }).unwrap();
        }
        assert_eq!(
            store.summary().unwrap(),
            StateSummary {
                last_accepted: Some(8),
                accepted_count: 2,
            }
        );
    }

    #[test]
    fn read_log_pages_by_sequence() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store
                .apply(Commit::Reject {
                    record: LogRecord::rejection(RejectionKind::Duplicate, n, None),
                })
                .unwrap();
        }

        let page: Vec<u64> = store
            .read_log(2, 2)
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(page, vec![2, 3]);

        // 0 and 1 both mean "from the start"
        assert_eq!(store.read_log(0, 10).unwrap().len(), 5);
        assert_eq!(store.read_log(1, 10).unwrap().len(), 5);
        assert!(store.read_log(6, 10).unwrap().is_empty());
    }
}
