//! Fuzz target for whole YOLO label files and `data.yaml` class lists.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xlabel::ir::io_yolo::fuzz_parse_label_file;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = fuzz_parse_label_file(text);
});
