//! Canonical JSON encoding of an [`AnnotationSet`].
//!
//! The same bytes are used for the PNG chunk payload (compact) and for
//! sidecar `.json` files (pretty-printed). Field order follows the struct
//! definitions and custom attributes keep their insertion order, so output
//! is deterministic.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::model::AnnotationSet;
use crate::error::XlabelError;

/// Decodes a chunk payload.
///
/// # Errors
///
/// Returns [`XlabelError::CorruptAnnotationData`] for invalid UTF-8/JSON or
/// when `format_version`, `class_names` or `annotations` is missing.
pub fn from_json_slice(bytes: &[u8]) -> Result<AnnotationSet, XlabelError> {
    serde_json::from_slice(bytes).map_err(|source| XlabelError::CorruptAnnotationData {
        message: source.to_string(),
        source: Some(source),
    })
}

pub fn from_json_str(json: &str) -> Result<AnnotationSet, XlabelError> {
    from_json_slice(json.as_bytes())
}

/// Encodes a set as compact UTF-8 JSON for embedding.
pub fn to_json_vec(set: &AnnotationSet) -> Result<Vec<u8>, XlabelError> {
    serde_json::to_vec(set).map_err(XlabelError::Serialize)
}

/// Encodes a set as indented JSON for sidecar files.
pub fn to_json_string_pretty(set: &AnnotationSet) -> Result<String, XlabelError> {
    serde_json::to_string_pretty(set).map_err(XlabelError::Serialize)
}

pub fn read_sidecar_json(path: &Path) -> Result<AnnotationSet, XlabelError> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| XlabelError::SidecarJson {
        path: path.to_path_buf(),
        source,
    })
}
