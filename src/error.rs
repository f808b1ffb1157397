use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// The main error type for xlabel operations.
#[derive(Debug, Error)]
pub enum XlabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed PNG: {message}")]
    MalformedPng { message: String },

    #[error("No XLabel annotation data found (missing '{chunk_type}' chunk)")]
    NoAnnotationData { chunk_type: String },

    #[error("Corrupt XLabel annotation data: {message}")]
    CorruptAnnotationData {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    Validation {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Image dimensions are required for {context} but are not known")]
    MissingDimensions { context: String },

    #[error("{format} cannot represent {feature}; pass allow_lossy to drop it")]
    UnsupportedFeature {
        format: &'static str,
        feature: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse sidecar JSON from {path}: {source}")]
    SidecarJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize annotation data: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse COCO JSON: {source}")]
    CocoJsonParse {
        #[source]
        source: serde_json::Error,
    },

    #[error("COCO conversion error: {message}")]
    CocoConvert { message: String },

    #[error("Failed to parse VOC XML: {message}")]
    VocXmlParse { message: String },

    #[error("Failed to parse YOLO label line {line}: {message}")]
    YoloLabelParse { line: usize, message: String },

    #[error("Invalid YOLO class list: {message}")]
    YoloClassList { message: String },

    #[error("Failed to read image dimensions: {source}")]
    ImageDimensionRead {
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to scan directory {path}: {message}")]
    DirectoryScan { path: PathBuf, message: String },

    #[error("Missing {kind} file: {path}")]
    MissingCompanion { kind: &'static str, path: PathBuf },

    #[error("Output file already exists: {path} (use --overwrite to replace it)")]
    OutputExists { path: PathBuf },

    #[error("{failed} of {total} file(s) failed")]
    BatchFailed { failed: usize, total: usize },
}

impl XlabelError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        XlabelError::MalformedPng {
            message: message.into(),
        }
    }

    pub(crate) fn validation(report: ValidationReport) -> Self {
        XlabelError::Validation {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        }
    }
}
