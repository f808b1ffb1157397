//! Conversion report types for tracking lossiness and policy decisions.
//!
//! This module provides structured reporting for format conversions,
//! similar to how `validation::ValidationReport` tracks annotation issues.

use serde::Serialize;
use std::fmt;

/// A report describing what a conversion keeps, drops or changes.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Source format name.
    pub from: String,
    /// Target format name.
    pub to: String,
    pub input: ConversionCounts,
    /// Counts in the output (may differ if fields are dropped).
    pub output: ConversionCounts,
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues (true lossiness).
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Count of info-level issues (policy decisions, notes).
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Info)
            .count()
    }

    /// Returns true if this conversion would lose information.
    pub fn is_lossy(&self) -> bool {
        self.warning_count() > 0
    }

    pub fn has_code(&self, code: ConversionIssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    pub fn lossy_messages(&self) -> impl Iterator<Item = &str> {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .map(|i| i.message.as_str())
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} class(es), {} annotation(s), {} segmentation(s)",
            self.input.classes, self.input.annotations, self.input.segmentations
        )?;

        if self.output != self.input {
            writeln!(
                f,
                "  output: {} class(es), {} annotation(s), {} segmentation(s)",
                self.output.classes, self.output.annotations, self.output.segmentations
            )?;
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            writeln!(f)?;
            writeln!(f, "Warnings ({}):", warnings)?;
            for message in self.lossy_messages() {
                writeln!(f, "  - {}", message)?;
            }
        }

        let infos = self.info_count();
        if infos > 0 {
            writeln!(f)?;
            writeln!(f, "Notes ({}):", infos)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ConversionSeverity::Info)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounts {
    pub classes: usize,
    pub annotations: usize,
    pub segmentations: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    /// Create a warning-level issue (indicates lossiness).
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Create an info-level issue (policy note, does not block).
    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// Information will be lost.
    Warning,
    /// A policy decision; nothing is lost.
    Info,
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON report and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    // Lossiness (Warning level)
    /// Segmentation masks cannot be represented (VOC, YOLO).
    DropSegmentation,
    /// Scores cannot be represented (VOC).
    DropScores,
    /// Custom attributes without a native field will be dropped.
    DropCustomAttributes,
    /// Normalized YOLO values fall outside [0, 1] and will be clamped.
    YoloCoordinatesClamped,

    // Policy decisions (Info level)
    /// COCO ids are assigned sequentially from 1.
    CocoIdAssignment,
    /// COCO `area` is computed from the bbox, not the mask.
    CocoAreaFromBBox,
    /// YOLO values are written with 6 decimal places.
    YoloFloatPrecision,
    /// YOLO class names are written to a separate class list.
    YoloClassListCompanion,
    /// VOC pose/truncated/difficult come from `voc_*` custom attributes.
    VocAttributeMapping,
}
