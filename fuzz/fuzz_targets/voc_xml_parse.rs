//! Fuzz target for VOC XML parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xlabel::ir::io_voc_xml::from_voc_xml_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_voc_xml_slice(data, &[]);
});
