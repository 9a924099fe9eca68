#![no_main]

use std::collections::HashSet;

use libfuzzer_sys::fuzz_target;
use seqguard::guard::SequenceGuard;
use seqguard::storage::MemoryStore;

fuzz_target!(|data: &[u8]| {
    // Treat the input as a stream of small values so duplicates and
    // predecessors are common
    let guard = SequenceGuard::new(MemoryStore::new());
    let mut accepted = HashSet::new();

    for &byte in data {
        let n = u64::from(byte);
        let outcome = guard.submit(n).unwrap();
        if outcome.is_accepted() {
            assert!(accepted.insert(n), "value accepted twice");
        }
    }

    assert_eq!(guard.accepted_count().unwrap(), accepted.len() as u64);
});
