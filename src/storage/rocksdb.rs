use std::path::Path;
use std::sync::Mutex;

use rocksdb::{BlockBasedOptions, Direction, IteratorMode, Options, ReadOptions, WriteBatch, WriteOptions, DB};

use crate::config::env_bool;
use crate::contracts::{
    Commit, LockResultExt, LogEntry, SequenceStore, StateSummary, StorageError,
};
use crate::storage::LogSequence;

/// Key prefix for accepted-set membership
const ACCEPTED_PREFIX: &str = "acc";
/// Key prefix for audit log entries
const LOG_PREFIX: &str = "log";
/// Last accepted value
const LAST_ACCEPTED_KEY: &str = "meta:last";
/// Size of the accepted set
const ACCEPTED_COUNT_KEY: &str = "meta:count";
/// Highest log sequence written
const LOG_HWM_KEY: &str = "meta:log_seq";

/// Configuration for the RocksDB store.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// fsync the WAL on every commit.
    /// Default: true
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self { sync_writes: true }
    }
}

impl RocksDbConfig {
    /// Creates a config from environment variables.
    ///
    /// Reads:
    /// - `SEQGUARD_SYNC_WRITES`: fsync every commit (default: true)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            sync_writes: env_bool("SEQGUARD_SYNC_WRITES", default.sync_writes),
        }
    }
}

/// RocksDB-backed sequence store.
///
/// Every commit is a single `WriteBatch`, so the accepted set, last accepted
/// value, accepted count and log entry become visible together.
pub struct RocksDbStore {
    db: DB,
    /// Audit log sequence, recovered from the persisted high watermark
    log_sequence: LogSequence,
    /// Serializes commits so count and membership updates stay consistent
    commit_lock: Mutex<()>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Opens or creates a store at the given path, configured from the environment.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_config(path, RocksDbConfig::from_env())
    }

    /// Opens or creates a store at the given path.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: RocksDbConfig,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // Keys and values are tiny; a small cache covers the hot set
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(16 * 1024 * 1024));
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, path)?;

        let log_hwm = Self::get_u64(&db, LOG_HWM_KEY)?.unwrap_or(0);
        let store = Self {
            db,
            log_sequence: LogSequence::starting_from(log_hwm),
            commit_lock: Mutex::new(()),
            config,
        };

        tracing::info!(
            path = %path.display(),
            last_accepted = ?store.last_accepted()?,
            accepted_count = store.accepted_count()?,
            log_high_watermark = log_hwm,
            sync_writes = store.config.sync_writes,
            "Opened RocksDB sequence store"
        );

        Ok(store)
    }

    /// Creates an accepted-set key. Hex keeps numeric order in the keyspace.
    fn accepted_key(value: u64) -> String {
        format!("{}:{:016x}", ACCEPTED_PREFIX, value)
    }

    /// Creates a log entry key.
    fn log_key(sequence: u64) -> String {
        format!("{}:{:016x}", LOG_PREFIX, sequence)
    }

    /// Upper bound for log scans (';' sorts right after ':').
    fn log_upper_bound() -> Vec<u8> {
        format!("{};", LOG_PREFIX).into_bytes()
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn serialize_entry(entry: &LogEntry) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(entry).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn deserialize_entry(bytes: &[u8]) -> Result<LogEntry, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Parses a u64 from big-endian bytes.
    #[inline]
    fn parse_u64_be(bytes: &[u8]) -> Result<u64, StorageError> {
        bytes
            .try_into()
            .map(u64::from_be_bytes)
            .map_err(|_| StorageError::Serialization("Invalid u64 bytes".into()))
    }

    #[inline]
    fn get_u64(db: &DB, key: &str) -> Result<Option<u64>, StorageError> {
        Self::decode_u64(db.get(key.as_bytes())?)
    }

    #[inline]
    fn decode_u64(raw: Option<Vec<u8>>) -> Result<Option<u64>, StorageError> {
        raw.map(|bytes| Self::parse_u64_be(&bytes)).transpose()
    }
}

impl SequenceStore for RocksDbStore {
    fn last_accepted(&self) -> Result<Option<u64>, StorageError> {
        Self::get_u64(&self.db, LAST_ACCEPTED_KEY)
    }

    fn is_accepted(&self, value: u64) -> Result<bool, StorageError> {
        Ok(self.db.get(Self::accepted_key(value).as_bytes())?.is_some())
    }

    fn accepted_count(&self) -> Result<u64, StorageError> {
        Ok(Self::get_u64(&self.db, ACCEPTED_COUNT_KEY)?.unwrap_or(0))
    }

    fn summary(&self) -> Result<StateSummary, StorageError> {
        // Both keys are written in the same batch; one snapshot sees both or neither
        let snapshot = self.db.snapshot();
        let last_accepted = Self::decode_u64(snapshot.get(LAST_ACCEPTED_KEY.as_bytes())?)?;
        let accepted_count = Self::decode_u64(snapshot.get(ACCEPTED_COUNT_KEY.as_bytes())?)?;

        Ok(StateSummary {
            last_accepted,
            accepted_count: accepted_count.unwrap_or(0),
        })
    }

    fn apply(&self, commit: Commit) -> Result<Option<LogEntry>, StorageError> {
        let _commit = self.commit_lock.lock().map_lock_err()?;
        let mut batch = WriteBatch::default();

        let record = match commit {
            Commit::Accept { value, audit } => {
                if self.is_accepted(value)? {
                    return Err(StorageError::InvariantViolation(format!(
                        "value {} is already accepted",
                        value
                    )));
                }
                let count = self.accepted_count()? + 1;

                batch.put(Self::accepted_key(value).as_bytes(), b"");
                batch.put(LAST_ACCEPTED_KEY.as_bytes(), value.to_be_bytes());
                batch.put(ACCEPTED_COUNT_KEY.as_bytes(), count.to_be_bytes());
                audit
            }
            Commit::Reject { record } => Some(record),
        };

        let entry = match record {
            Some(record) => {
                let sequence = self.log_sequence.next()?;
                let entry = record.into_entry(sequence);
                batch.put(Self::log_key(sequence).as_bytes(), Self::serialize_entry(&entry)?);
                batch.put(LOG_HWM_KEY.as_bytes(), sequence.to_be_bytes());
                Some(entry)
            }
            None => None,
        };

        // Single atomic write for the whole transition
        self.db.write_opt(batch, &self.write_options())?;

        Ok(entry)
    }

    fn read_log(&self, from_sequence: u64, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        let mut entries = Vec::with_capacity(limit.min(1024));
        if limit == 0 {
            return Ok(entries);
        }

        let start_key = Self::log_key(from_sequence);
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_upper_bound(Self::log_upper_bound());

        let iter = self.db.iterator_opt(
            IteratorMode::From(start_key.as_bytes(), Direction::Forward),
            read_opts,
        );

        for item in iter {
            let (_, value) = item?;
            entries.push(Self::deserialize_entry(&value)?);
            if entries.len() >= limit {
                break;
            }
        }

        Ok(entries)
    }

    fn log_high_watermark(&self) -> Result<u64, StorageError> {
        Ok(Self::get_u64(&self.db, LOG_HWM_KEY)?.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{EntryKind, LogRecord, RejectionKind};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksDbStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksDbStore::open_with_config(dir.path(), RocksDbConfig::default()).unwrap();
        (store, dir)
    }

    fn accept(store: &RocksDbStore, value: u64) {
        store
            .apply(Commit::Accept { value, audit: None })
            .unwrap();
    }

    #[test]
    fn empty_store_has_no_state() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.last_accepted().unwrap(), None);
        assert_eq!(store.accepted_count().unwrap(), 0);
        assert!(!store.is_accepted(0).unwrap());
        assert!(store.read_log(0, 100).unwrap().is_empty());
        assert_eq!(store.log_high_watermark().unwrap(), 0);
    }

    #[test]
    fn summary_matches_individual_reads() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.summary().unwrap(), StateSummary::default());

        accept(&store, 5);
        accept(&store, 10);
        assert_eq!(
            store.summary().unwrap(),
            StateSummary {
                last_accepted: Some(10),
                accepted_count: 2,
            }
        );
    }

    #[test]
    fn accept_updates_set_last_and_count() {
        let (store, _dir) = create_test_store();
        accept(&store, 5);
        accept(&store, 3);

        assert!(store.is_accepted(5).unwrap());
        assert!(store.is_accepted(3).unwrap());
        assert!(!store.is_accepted(4).unwrap());
        assert_eq!(store.last_accepted().unwrap(), Some(3));
        assert_eq!(store.accepted_count().unwrap(), 2);
    }

    #[test]
    fn accept_without_audit_writes_no_log() {
        let (store, _dir) = create_test_store();
        let entry = store
            .apply(Commit::Accept {
                value: 1,
                audit: None,
            })
            .unwrap();
        assert!(entry.is_none());
        assert!(store.read_log(0, 10).unwrap().is_empty());
    }

    #[test]
    fn accept_with_audit_logs_in_same_commit() {
        let (store, _dir) = create_test_store();
        let entry = store
            .apply(Commit::Accept {
                value: 9,
                audit: Some(LogRecord::acceptance(9, None)),
            })
            .unwrap()
            .unwrap();

        assert_eq!(entry.sequence, 1);
        assert_eq!(entry.kind, EntryKind::Accepted);
        assert_eq!(store.read_log(0, 10).unwrap(), vec![entry]);
    }

    #[test]
    fn accepting_twice_is_an_invariant_violation() {
        let (store, _dir) = create_test_store();
        accept(&store, 7);
        let err = store
            .apply(Commit::Accept {
                value: 7,
                audit: None,
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation(_)));
        assert_eq!(store.accepted_count().unwrap(), 1);
    }

    #[test]
    fn reject_only_appends_log() {
        let (store, _dir) = create_test_store();
        accept(&store, 5);

        let entry = store
            .apply(Commit::Reject {
                record: LogRecord::rejection(RejectionKind::SequenceViolation, 4, Some(5)),
            })
            .unwrap()
            .unwrap();

        assert_eq!(entry.kind, EntryKind::SequenceViolation);
        assert_eq!(entry.submitted, 4);
        assert_eq!(entry.last_accepted, Some(5));
        assert!(!store.is_accepted(4).unwrap());
        assert_eq!(store.last_accepted().unwrap(), Some(5));
        assert_eq!(store.accepted_count().unwrap(), 1);
    }

    #[test]
    fn read_log_respects_start_and_limit() {
        let (store, _dir) = create_test_store();
        for n in 0..10 {
            store
                .apply(Commit::Reject {
                    record: LogRecord::rejection(RejectionKind::Duplicate, n, None),
                })
                .unwrap();
        }

        let entries = store.read_log(4, 3).unwrap();
        let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![4, 5, 6]);

        assert!(store.read_log(11, 10).unwrap().is_empty());
        assert!(store.read_log(0, 0).unwrap().is_empty());
        assert_eq!(store.log_high_watermark().unwrap(), 10);
    }

    #[test]
    fn large_values_keep_exact_membership() {
        let (store, _dir) = create_test_store();
        let big = i64::MAX as u64;
        accept(&store, big);
        assert!(store.is_accepted(big).unwrap());
        assert!(!store.is_accepted(big - 1).unwrap());
        assert_eq!(store.last_accepted().unwrap(), Some(big));
    }
}
