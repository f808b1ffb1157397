//! Fuzz target for parsing YOLO label lines, alone and as a whole file.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xlabel::ir::io_yolo::{fuzz_parse_label_file, fuzz_parse_label_line};

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let _ = fuzz_parse_label_line(line);
    let _ = fuzz_parse_label_file(line);
});
