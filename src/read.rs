//! Reading annotation sets back out of PNG files.

use crate::error::XlabelError;
use crate::ir::{io_json, AnnotationSet};
use crate::png::{self, XLABEL_CHUNK_TYPE};
use crate::validation::{validate_annotation_set, ValidationReport};

/// Options for [`read`].
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Fail on any validation error. When false, annotations with errors are
    /// dropped and the rest is returned alongside the report.
    pub strict: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// A decoded set together with the validation findings.
#[derive(Clone, Debug)]
pub struct ReadOutcome {
    pub annotation_set: AnnotationSet,
    pub report: ValidationReport,
    /// Indices (in the stored payload) of annotations removed in lenient mode.
    pub dropped: Vec<usize>,
}

/// Reads the embedded annotation set from `png_bytes`.
///
/// # Errors
///
/// - [`XlabelError::MalformedPng`] if the PNG itself is broken
/// - [`XlabelError::NoAnnotationData`] if there is no `xlDa` chunk
/// - [`XlabelError::CorruptAnnotationData`] if the payload is not a valid set
/// - [`XlabelError::Validation`] in strict mode when the set has errors
pub fn read(png_bytes: &[u8], opts: &ReadOptions) -> Result<AnnotationSet, XlabelError> {
    read_with_report(png_bytes, opts).map(|outcome| outcome.annotation_set)
}

/// Like [`read`], but also returns the validation report.
pub fn read_with_report(png_bytes: &[u8], opts: &ReadOptions) -> Result<ReadOutcome, XlabelError> {
    let chunks = png::parse(png_bytes)?;
    let payload = png::find_custom_chunk(&chunks, XLABEL_CHUNK_TYPE).ok_or_else(|| {
        XlabelError::NoAnnotationData {
            chunk_type: XLABEL_CHUNK_TYPE.to_string(),
        }
    })?;

    let mut set = io_json::from_json_slice(payload)?;
    let report = validate_annotation_set(&set);

    if opts.strict {
        if !report.is_ok() {
            return Err(XlabelError::validation(report));
        }
        return Ok(ReadOutcome {
            annotation_set: set,
            report,
            dropped: Vec::new(),
        });
    }

    for issue in &report.issues {
        tracing::warn!(
            severity = ?issue.severity,
            code = ?issue.code,
            context = %issue.context,
            "{}",
            issue.message
        );
    }

    let dropped = report.annotations_with_errors();
    if !dropped.is_empty() {
        tracing::warn!(
            dropped = dropped.len(),
            kept = set.annotations.len() - dropped.len(),
            "dropping invalid annotations in lenient read"
        );
        let mut index = 0;
        set.annotations.retain(|_| {
            let keep = dropped.binary_search(&index).is_err();
            index += 1;
            keep
        });
    }

    Ok(ReadOutcome {
        annotation_set: set,
        report,
        dropped,
    })
}

/// Returns true if the PNG carries an annotation chunk.
pub fn has_annotation_data(png_bytes: &[u8]) -> Result<bool, XlabelError> {
    let chunks = png::parse(png_bytes)?;
    Ok(png::count_chunks(&chunks, XLABEL_CHUNK_TYPE) > 0)
}
