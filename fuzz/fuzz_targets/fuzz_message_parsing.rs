//! Fuzz target for network message decoding.
//!
//! This target tests that arbitrary bytes cannot crash the message decoder.
//! Malformed, truncated or foreign data must come back as an error.
//!
//! # Safety Properties Tested
//! - No panics on arbitrary input
//! - No unbounded memory allocation (the codec enforces a size limit)
//! - Anything that decodes re-encodes to the same length

#![no_main]

use libfuzzer_sys::fuzz_target;

use rampart::network::codec;

fuzz_target!(|data: &[u8]| {
    // Should never panic, even on garbage
    let Ok(msg) = codec::decode_message(data) else {
        return;
    };

    // decode_message rejects trailing bytes and integers are fixed width,
    // so a successful decode consumed exactly as many bytes as it re-encodes to.
    let encoded = codec::encode_message(&msg).expect("decoded message must re-encode");
    assert_eq!(encoded.len(), data.len(), "re-encoding changed the length");
});
