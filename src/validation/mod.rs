//! Structural validation of annotation sets.
//!
//! Checks the model invariants that embedding and reading rely on:
//! - `format_version` is a semantic version this crate understands
//! - class names are unique and non-empty
//! - every `class_id` indexes into `class_names`
//! - boxes are finite and non-negative, and ideally inside the image
//! - scores lie in `[0, 1]` and segmentations are well formed
//!
//! Validation never stops early; the report lists every issue found.

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::HashMap;

use semver::Version;

use crate::ir::{Annotation, AnnotationSet, ImageDims, RleMask, Segmentation};

/// Newest schema version this crate reads without warning.
pub fn supported_format_version() -> Version {
    Version::new(0, 2, 0)
}

/// Slack allowed past the image edge before a box counts as out of bounds.
const BOUNDS_TOLERANCE: f64 = 0.5;

#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

impl ValidateOptions {
    /// Returns true if `report` passes under these options.
    pub fn passes(&self, report: &ValidationReport) -> bool {
        if self.strict {
            report.is_ok_strict()
        } else {
            report.is_ok()
        }
    }
}

/// Validates an annotation set and returns a report of all issues found.
///
/// Strictness is a property of how the report is judged; see
/// [`ValidateOptions::passes`].
pub fn validate_annotation_set(set: &AnnotationSet) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_format_version(&set.format_version, &mut report);
    validate_image_properties(set, &mut report);
    validate_class_names(&set.class_names, &mut report);

    let dims = set.image_properties.dims();
    for (index, annotation) in set.annotations.iter().enumerate() {
        validate_annotation(index, annotation, set.class_names.len(), dims, &mut report);
    }

    report
}

fn validate_format_version(version: &str, report: &mut ValidationReport) {
    let parsed = match Version::parse(version.trim()) {
        Ok(parsed) => parsed,
        Err(err) => {
            report.add(ValidationIssue::error(
                IssueCode::InvalidFormatVersion,
                format!("'{}' is not a semantic version: {}", version, err),
                IssueContext::AnnotationSet,
            ));
            return;
        }
    };

    let supported = supported_format_version();
    if (parsed.major, parsed.minor) > (supported.major, supported.minor) {
        report.add(ValidationIssue::warning(
            IssueCode::UnsupportedFormatVersion,
            format!(
                "format version {} is newer than supported version {}; unknown fields are ignored",
                parsed, supported
            ),
            IssueContext::AnnotationSet,
        ));
    }
}

fn validate_image_properties(set: &AnnotationSet, report: &mut ValidationReport) {
    let props = &set.image_properties;

    if props.filename.trim().is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::EmptyFileName,
            "Empty filename",
            IssueContext::ImageProperties,
        ));
    }

    if props.dims().is_none() {
        report.add(ValidationIssue::warning(
            IssueCode::MissingImageDimensions,
            format!(
                "Dimensions {}x{} are unknown; bounding boxes were not checked against the image",
                props.width, props.height
            ),
            IssueContext::ImageProperties,
        ));
    }
}

fn validate_class_names(class_names: &[String], report: &mut ValidationReport) {
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (index, name) in class_names.iter().enumerate() {
        if name.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyClassName,
                "Empty class name",
                IssueContext::Class { index },
            ));
        }

        if let Some(first) = seen.get(name.as_str()) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateClassName,
                format!(
                    "Duplicate class name '{}' (first seen at index {})",
                    name, first
                ),
                IssueContext::Class { index },
            ));
        } else {
            seen.insert(name, index);
        }
    }
}

fn validate_annotation(
    index: usize,
    annotation: &Annotation,
    class_count: usize,
    dims: Option<ImageDims>,
    report: &mut ValidationReport,
) {
    let context = IssueContext::Annotation { index };

    if !matches!(annotation.class_index(), Some(idx) if idx < class_count) {
        report.add(ValidationIssue::error(
            IssueCode::ClassIdOutOfRange,
            format!(
                "class_id {} is out of range for {} class name(s)",
                annotation.class_id, class_count
            ),
            context.clone(),
        ));
    }

    if let Some(score) = annotation.score {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            report.add(ValidationIssue::error(
                IssueCode::ScoreOutOfRange,
                format!("score {} is outside [0, 1]", score),
                context.clone(),
            ));
        }
    }

    match &annotation.segmentation {
        Some(Segmentation::Polygon(rings)) => validate_polygon(rings, &context, report),
        Some(Segmentation::Rle(mask)) => validate_rle(mask, dims, &context, report),
        None => {}
    }

    validate_bbox(annotation, dims, &context, report);
}

fn validate_bbox(
    annotation: &Annotation,
    dims: Option<ImageDims>,
    context: &IssueContext,
    report: &mut ValidationReport,
) {
    let bbox = &annotation.bbox;
    let [x, y, w, h] = bbox.to_xywh();

    if !bbox.is_finite() {
        report.add(ValidationIssue::error(
            IssueCode::BBoxNotFinite,
            format!("Non-finite bbox [{}, {}, {}, {}]", x, y, w, h),
            context.clone(),
        ));
        return;
    }

    if bbox.has_negative() {
        report.add(ValidationIssue::error(
            IssueCode::BBoxNegative,
            format!("Negative value in bbox [{}, {}, {}, {}]", x, y, w, h),
            context.clone(),
        ));
        return;
    }

    if w == 0.0 || h == 0.0 {
        report.add(ValidationIssue::warning(
            IssueCode::BBoxZeroSize,
            format!("Zero-sized bbox {}x{}", w, h),
            context.clone(),
        ));
    }

    if let Some(dims) = dims {
        let (max_x, max_y) = (
            f64::from(dims.width) + BOUNDS_TOLERANCE,
            f64::from(dims.height) + BOUNDS_TOLERANCE,
        );
        if !bbox.fits_within(max_x, max_y) {
            report.add(ValidationIssue::warning(
                IssueCode::BBoxOutOfBounds,
                format!(
                    "Bounding box ({:.1}, {:.1}, {:.1}, {:.1}) extends outside image bounds (0, 0, {}, {})",
                    bbox.xmin(),
                    bbox.ymin(),
                    bbox.xmax(),
                    bbox.ymax(),
                    dims.width,
                    dims.height
                ),
                context.clone(),
            ));
        }
    }
}

fn validate_polygon(rings: &[Vec<f64>], context: &IssueContext, report: &mut ValidationReport) {
    if rings.is_empty() {
        report.add(ValidationIssue::error(
            IssueCode::InvalidPolygon,
            "Polygon segmentation has no rings",
            context.clone(),
        ));
        return;
    }

    for (ring_idx, ring) in rings.iter().enumerate() {
        if ring.len() < 6 || ring.len() % 2 != 0 {
            report.add(ValidationIssue::error(
                IssueCode::InvalidPolygon,
                format!(
                    "Polygon ring {} has {} value(s); expected an even count of at least 6",
                    ring_idx,
                    ring.len()
                ),
                context.clone(),
            ));
        } else if ring.iter().any(|v| !v.is_finite()) {
            report.add(ValidationIssue::error(
                IssueCode::InvalidPolygon,
                format!("Polygon ring {} has non-finite coordinates", ring_idx),
                context.clone(),
            ));
        }
    }
}

fn validate_rle(
    mask: &RleMask,
    dims: Option<ImageDims>,
    context: &IssueContext,
    report: &mut ValidationReport,
) {
    let expected = u64::from(mask.height()) * u64::from(mask.width());
    if let Some(total) = mask.uncompressed_total() {
        if total != expected {
            report.add(ValidationIssue::error(
                IssueCode::InvalidRle,
                format!(
                    "RLE runs cover {} pixel(s) but size {}x{} needs {}",
                    total,
                    mask.height(),
                    mask.width(),
                    expected
                ),
                context.clone(),
            ));
        }
    }

    if let Some(dims) = dims {
        if mask.width() != dims.width || mask.height() != dims.height {
            report.add(ValidationIssue::warning(
                IssueCode::RleSizeMismatch,
                format!(
                    "RLE size [{}, {}] differs from image size [{}, {}]",
                    mask.height(),
                    mask.width(),
                    dims.height,
                    dims.width
                ),
                context.clone(),
            ));
        }
    }
}
