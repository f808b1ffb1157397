//! Fuzz target for COCO JSON import.
//!
//! Feeds arbitrary bytes to the COCO importer, looking for panics or hangs.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use xlabel::ir::io_coco_json::from_coco_slice;

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for a COCO file.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_coco_slice(data, None, &[]);
});
