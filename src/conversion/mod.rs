//! Conversion between the canonical model and external formats.
//!
//! The three external formats form a closed set ([`Format`]) behind two
//! entry points, [`convert_to_canonical`] and [`convert_from_canonical`].
//! Every export is preceded by a [`ConversionReport`] describing what the
//! target format keeps, drops or changes.

pub mod report;

pub use report::{
    ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
};

use std::fmt;
use std::str::FromStr;

use crate::error::XlabelError;
use crate::ir::io_coco_json;
use crate::ir::io_voc_xml::{self, NATIVE_ATTRIBUTES};
use crate::ir::io_yolo;
use crate::ir::{AnnotationSet, ImageDims, DEFAULT_FORMAT_VERSION};

/// External annotation format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Coco,
    Voc,
    Yolo,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Coco, Format::Voc, Format::Yolo];

    /// Human-readable name for the format.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Coco => "coco",
            Format::Voc => "voc",
            Format::Yolo => "yolo",
        }
    }

    /// File extension of a per-image annotation file.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Coco => "json",
            Format::Voc => "xml",
            Format::Yolo => "txt",
        }
    }

    /// Looks a format up by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, XlabelError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "coco" => Ok(Format::Coco),
            "voc" | "pascal-voc" | "pascal_voc" => Ok(Format::Voc),
            "yolo" => Ok(Format::Yolo),
            _ => Err(XlabelError::UnsupportedFormat(name.to_string())),
        }
    }
}

impl FromStr for Format {
    type Err = XlabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_name(s)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options shared by import and export.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Image size used when the annotations themselves do not carry one.
    /// Required for YOLO import.
    pub image_dims: Option<ImageDims>,
    /// Filename recorded on import; for COCO it also selects the image.
    pub image_filename: Option<String>,
    /// Authoritative class order. On YOLO import every class id must index
    /// into it; other formats append unseen names.
    pub class_names: Option<Vec<String>>,
    /// Allow exports that drop segmentation.
    pub allow_lossy: bool,
    /// Format version stamped on imported sets.
    pub format_version: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            image_dims: None,
            image_filename: None,
            class_names: None,
            allow_lossy: false,
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn with_image_dims(mut self, width: u32, height: u32) -> Self {
        self.image_dims = Some(ImageDims::new(width, height));
        self
    }

    pub fn with_image_filename(mut self, filename: impl Into<String>) -> Self {
        self.image_filename = Some(filename.into());
        self
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = Some(class_names);
        self
    }

    pub fn allow_lossy(mut self, allow: bool) -> Self {
        self.allow_lossy = allow;
        self
    }

    fn seed_class_names(&self) -> &[String] {
        self.class_names.as_deref().unwrap_or(&[])
    }
}

/// Imports one image's annotations from `input` in `format`.
pub fn convert_to_canonical(
    format: Format,
    input: &[u8],
    opts: &ConvertOptions,
) -> Result<AnnotationSet, XlabelError> {
    let seed = opts.seed_class_names();
    let mut set = match format {
        Format::Coco => io_coco_json::from_coco_slice(input, opts.image_filename.as_deref(), seed)?,
        Format::Voc => io_voc_xml::from_voc_xml_slice(input, seed)?,
        Format::Yolo => {
            let dims = opts.image_dims.ok_or_else(|| XlabelError::MissingDimensions {
                context: "YOLO import needs the image width and height".to_string(),
            })?;
            let text = std::str::from_utf8(input).map_err(|source| XlabelError::YoloLabelParse {
                line: 0,
                message: format!("input is not valid UTF-8: {source}"),
            })?;
            io_yolo::from_yolo_str(text, seed, dims, opts.image_filename.as_deref().unwrap_or(""))?
        }
    };

    if set.image_properties.dims().is_none() {
        if let Some(dims) = opts.image_dims {
            set.image_properties.width = dims.width;
            set.image_properties.height = dims.height;
        }
    }
    if set.image_properties.filename.is_empty() {
        if let Some(filename) = &opts.image_filename {
            set.image_properties.filename = filename.clone();
        }
    }
    set.format_version = opts.format_version.clone();

    tracing::debug!(
        format = format.name(),
        annotations = set.annotations.len(),
        classes = set.class_names.len(),
        "imported annotations"
    );
    Ok(set)
}

/// Exports `set` as `format`.
///
/// Fails with [`XlabelError::UnsupportedFeature`] when segmentation would be
/// dropped and `allow_lossy` is not set. Other lossy drops are logged.
pub fn convert_from_canonical(
    format: Format,
    set: &AnnotationSet,
    opts: &ConvertOptions,
) -> Result<Vec<u8>, XlabelError> {
    convert_from_canonical_with_report(format, set, opts).map(|(bytes, _)| bytes)
}

/// Like [`convert_from_canonical`], also returning the conversion report.
pub fn convert_from_canonical_with_report(
    format: Format,
    set: &AnnotationSet,
    opts: &ConvertOptions,
) -> Result<(Vec<u8>, ConversionReport), XlabelError> {
    let report = build_conversion_report(set, format, opts);
    ensure_allowed(&report, format, opts)?;

    for message in report.lossy_messages() {
        tracing::warn!(format = format.name(), "{}", message);
    }

    let output = match format {
        Format::Coco => io_coco_json::to_coco_string(set, opts.image_dims)?,
        Format::Voc => io_voc_xml::to_voc_xml_string(set, opts.image_dims)?,
        Format::Yolo => io_yolo::to_yolo_string(set, opts.image_dims)?,
    };

    Ok((output.into_bytes(), report))
}

/// Rejects a lossy export the caller has not opted into.
pub(crate) fn ensure_allowed(
    report: &ConversionReport,
    format: Format,
    opts: &ConvertOptions,
) -> Result<(), XlabelError> {
    if !opts.allow_lossy && report.has_code(ConversionIssueCode::DropSegmentation) {
        return Err(XlabelError::UnsupportedFeature {
            format: format.name(),
            feature: "segmentation".to_string(),
        });
    }
    Ok(())
}

/// Build a conversion report analyzing what will happen during export.
///
/// This function examines the annotation set and target format to determine:
/// - Input/output counts
/// - What information will be lost (warnings)
/// - What policy decisions apply (info notes)
pub fn build_conversion_report(
    set: &AnnotationSet,
    to: Format,
    opts: &ConvertOptions,
) -> ConversionReport {
    let mut report = ConversionReport::new("xlabel", to.name());

    report.input = ConversionCounts {
        classes: set.class_names.len(),
        annotations: set.annotations.len(),
        segmentations: segmentation_count(set),
    };

    match to {
        Format::Coco => analyze_to_coco(set, &mut report),
        Format::Voc => analyze_to_voc(set, &mut report),
        Format::Yolo => analyze_to_yolo(set, opts, &mut report),
    }

    report
}

fn segmentation_count(set: &AnnotationSet) -> usize {
    set.annotations
        .iter()
        .filter(|ann| ann.segmentation.is_some())
        .count()
}

/// Number of annotations carrying a custom attribute whose key is not in `kept`.
fn annotations_with_foreign_attributes(set: &AnnotationSet, kept: &[&str]) -> usize {
    set.annotations
        .iter()
        .filter(|ann| {
            ann.custom_attributes
                .as_ref()
                .is_some_and(|attrs| attrs.keys().any(|k| !kept.contains(&k.as_str())))
        })
        .count()
}

fn add_drop_segmentation(set: &AnnotationSet, to: Format, report: &mut ConversionReport) {
    let segmentations = segmentation_count(set);
    if segmentations > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropSegmentation,
            format!(
                "{} segmentation(s) cannot be represented in {} and will be dropped",
                segmentations,
                to.name()
            ),
        ));
    }
}

fn analyze_to_coco(set: &AnnotationSet, report: &mut ConversionReport) {
    report.add(ConversionIssue::info(
        ConversionIssueCode::CocoIdAssignment,
        "COCO writer assigns image, annotation and category ids sequentially from 1".to_string(),
    ));

    if segmentation_count(set) > 0 {
        report.add(ConversionIssue::info(
            ConversionIssueCode::CocoAreaFromBBox,
            "COCO area is computed from the bounding box, not the mask".to_string(),
        ));
    }

    report.output = report.input.clone();
}

fn analyze_to_voc(set: &AnnotationSet, report: &mut ConversionReport) {
    add_drop_segmentation(set, Format::Voc, report);

    let scored = set.annotations.iter().filter(|ann| ann.score.is_some()).count();
    if scored > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropScores,
            format!("{} annotation(s) have scores that will be dropped", scored),
        ));
    }

    let foreign = annotations_with_foreign_attributes(set, &NATIVE_ATTRIBUTES);
    if foreign > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropCustomAttributes,
            format!(
                "{} annotation(s) have custom attributes with no VOC field that will be dropped",
                foreign
            ),
        ));
    }

    let mapped = set.annotations.iter().any(|ann| {
        NATIVE_ATTRIBUTES
            .iter()
            .any(|key| ann.attribute(key).is_some())
    });
    if mapped {
        report.add(ConversionIssue::info(
            ConversionIssueCode::VocAttributeMapping,
            "VOC pose/truncated/difficult/occluded are written from voc_* custom attributes"
                .to_string(),
        ));
    }

    report.output = ConversionCounts {
        segmentations: 0,
        ..report.input.clone()
    };
}

fn analyze_to_yolo(set: &AnnotationSet, opts: &ConvertOptions, report: &mut ConversionReport) {
    add_drop_segmentation(set, Format::Yolo, report);

    let foreign = annotations_with_foreign_attributes(set, &[]);
    if foreign > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropCustomAttributes,
            format!(
                "{} annotation(s) have custom attributes that YOLO cannot represent",
                foreign
            ),
        ));
    }

    if let Some(dims) = set.image_properties.dims().or(opts.image_dims) {
        let clamped = set
            .annotations
            .iter()
            .filter(|ann| io_yolo::needs_clamping(ann, dims))
            .count();
        if clamped > 0 {
            report.add(ConversionIssue::warning(
                ConversionIssueCode::YoloCoordinatesClamped,
                format!(
                    "{} annotation(s) extend past the image and will be clamped into [0, 1]",
                    clamped
                ),
            ));
        }
    }

    report.add(ConversionIssue::info(
        ConversionIssueCode::YoloFloatPrecision,
        format!(
            "YOLO values are written with {} decimal places",
            io_yolo::FLOAT_PRECISION
        ),
    ));
    report.add(ConversionIssue::info(
        ConversionIssueCode::YoloClassListCompanion,
        "YOLO class names are written to a separate classes.txt".to_string(),
    ));

    report.output = ConversionCounts {
        segmentations: 0,
        ..report.input.clone()
    };
}
