//! Fuzz target for Payload::decode
//!
//! Feeds arbitrary bytes through every payload variant decoder to find:
//! - Panics on malformed fixed-size layouts
//! - Length-field confusion in the variable-size variants
//! - Out-of-range enumerated fields that slip through
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use bridge_proto::{MessageType, Payload};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let kinds = [
        MessageType::Readings,
        MessageType::Status,
        MessageType::Event,
        MessageType::Command,
        MessageType::Ack,
    ];

    for kind in kinds {
        // Attempt to decode the bytes as every payload variant
        // This should never panic, only return Err for invalid layouts
        let _ = Payload::decode(kind, data);
    }
});
