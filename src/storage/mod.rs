mod memory;
mod rocksdb;
mod sequence;

pub use memory::MemoryStore;
pub use rocksdb::{RocksDbConfig, RocksDbStore};
pub use sequence::LogSequence;
