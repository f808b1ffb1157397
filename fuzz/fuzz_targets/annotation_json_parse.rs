//! Fuzz target for the embedded annotation payload decoder.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xlabel::ir::io_json::from_json_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_json_slice(data);
});
