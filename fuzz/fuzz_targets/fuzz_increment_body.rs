#![no_main]

use libfuzzer_sys::fuzz_target;
use seqguard::api::{parse_increment_body, ValidationError};
use seqguard::contracts::MAX_SUBMIT_VALUE;

fuzz_target!(|data: &[u8]| {
    // Arbitrary request bodies must never panic the parser
    match parse_increment_body(Some("application/json"), data) {
        Ok(n) => assert!(n <= MAX_SUBMIT_VALUE),
        Err(ValidationError::JsonBodyRequired) => {
            panic!("JSON content type was rejected as non-JSON")
        }
        Err(_) => {}
    }

    // Without a JSON content type nothing is parsed
    assert_eq!(
        parse_increment_body(Some("text/plain"), data),
        Err(ValidationError::JsonBodyRequired)
    );
});
