#![allow(dead_code)]

use std::fs;
use std::path::Path;

use xlabel::ir::{Annotation, AnnotationSet, BBox, ImageProperties};
use xlabel::png::{self, Chunk, ChunkType};

/// Smallest well-formed RGB PNG stream: IHDR, one IDAT and IEND.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    png::serialize(&base_chunks(width, height))
}

/// Like [`png_bytes`], with extra chunks placed between IHDR and IDAT.
pub fn png_bytes_with(width: u32, height: u32, extra: Vec<Chunk>) -> Vec<u8> {
    let mut chunks = base_chunks(width, height);
    let idat = chunks.len() - 2;
    chunks.splice(idat..idat, extra);
    png::serialize(&chunks)
}

fn base_chunks(width: u32, height: u32) -> Vec<Chunk> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    vec![
        Chunk::new(ChunkType::IHDR, ihdr),
        Chunk::new(ChunkType::IDAT, vec![0x78, 0x9c, 0x63, 0x60, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01]),
        Chunk::new(ChunkType::IEND, Vec::new()),
    ]
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, png_bytes(width, height)).expect("write png file");
}

/// The cat/dog set used throughout the docs.
pub fn pets_set() -> AnnotationSet {
    AnnotationSet::new(vec!["cat".into(), "dog".into()])
        .with_image_properties(ImageProperties::new("pets.png", 0, 0))
        .with_annotation(
            Annotation::new(0, BBox::from_xywh(50.0, 50.0, 100.0, 120.0)).with_score(0.95),
        )
}

pub fn assert_bbox_close(actual: [f64; 4], expected: [f64; 4], eps: f64) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a - e).abs() <= eps,
            "bbox {:?} differs from {:?} by more than {}",
            actual,
            expected,
            eps
        );
    }
}
