//! Fuzz testing for policy construction.
//!
//! Arbitrary bytes are fed to the directive validators and, when they parse
//! as JSON, to `SecurityPolicy::new`. Construction must either succeed or
//! return `SageError`; a built policy must apply to a header map without
//! panicking.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the policy fuzz target
//! cargo +nightly fuzz run fuzz_policy
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_policy -- -max_total_time=60
//! ```

#![no_main]

use axum::http::HeaderMap;
use libfuzzer_sys::fuzz_target;
use sage_headers::validation::{validate_directive_name, validate_header_text, validate_source};
use sage_headers::{PolicyOptions, SecurityPolicy};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = validate_directive_name("fuzz", s);
        let _ = validate_source("fuzz", s);
        let _ = validate_header_text("fuzz", s);
    }

    if let Ok(options) = serde_json::from_slice::<PolicyOptions>(data) {
        if let Ok(policy) = SecurityPolicy::new(options) {
            let mut headers = HeaderMap::new();
            policy.apply(&mut headers);
        }
    }
});
