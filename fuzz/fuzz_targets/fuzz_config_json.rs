//! Fuzz target: persisted configuration decoder
//!
//! Feeds arbitrary text to `Configuration::from_json` and checks:
//! - No panics under arbitrary input
//! - Anything that decodes carries the current schema version
//! - A decoded configuration re-encodes and decodes to itself
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use boardmanager::config::{CONFIGURATION_VERSION, Configuration};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(cfg) = Configuration::from_json(text) else {
        return;
    };
    assert_eq!(cfg.version, CONFIGURATION_VERSION);

    let json = cfg.to_json().expect("decoded configuration must encode");
    let again = Configuration::from_json(&json).expect("re-encoded configuration must decode");
    assert_eq!(again, cfg);
});
