//! Fuzz target for the PNG chunk codec.
//!
//! Anything the parser accepts must serialize back to the exact input.
//!
//! Run with:
//!   cargo +nightly fuzz run png_chunk_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use xlabel::png;

fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 * 1024 {
        return;
    }

    if let Ok(chunks) = png::parse(data) {
        assert_eq!(png::serialize(&chunks), data);
    }
});
