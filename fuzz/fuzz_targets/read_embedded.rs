//! Fuzz target for reading annotations out of PNG streams in lenient mode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xlabel::read::{read_with_report, ReadOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 * 1024 {
        return;
    }

    let _ = read_with_report(data, &ReadOptions { strict: false });
});
