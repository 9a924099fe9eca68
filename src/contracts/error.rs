use std::sync::{MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Value out of range: {0}")]
    OutOfRange(u64),
}

/// Extension trait for converting lock errors to StorageError.
pub trait LockResultExt<T> {
    /// Converts a lock error to a StorageError.
    fn map_lock_err(self) -> Result<T, StorageError>;
}

impl<'a, T> LockResultExt<MutexGuard<'a, T>>
    for Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<MutexGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<RwLockReadGuard<'a, T>>
    for Result<RwLockReadGuard<'a, T>, PoisonError<RwLockReadGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockReadGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<RwLockWriteGuard<'a, T>>
    for Result<RwLockWriteGuard<'a, T>, PoisonError<RwLockWriteGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockWriteGuard<'a, T>, StorageError> {
        self.map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::RocksDb(e.to_string())
    }
}
