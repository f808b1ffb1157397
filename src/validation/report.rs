//! Validation report types for structured error reporting.
//!
//! A report collects every issue found in an annotation set instead of
//! stopping at the first one, so callers can show the complete list.

use std::fmt;

/// The result of validating an annotation set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Appends every issue of `other`.
    pub fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true if validation passed in strict mode (no errors or warnings).
    pub fn is_ok_strict(&self) -> bool {
        self.issues.is_empty()
    }

    /// Indices of annotations that carry at least one error.
    pub fn annotations_with_errors(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .filter_map(|i| match i.context {
                IssueContext::Annotation { index } => Some(index),
                _ => None,
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Returns true if an error is attached to something other than a single
    /// annotation (class list, image properties or the set itself).
    pub fn has_set_level_errors(&self) -> bool {
        self.issues.iter().any(|i| {
            i.severity == Severity::Error && !matches!(i.context, IssueContext::Annotation { .. })
        })
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Validation passed: no issues found");
        }

        writeln!(
            f,
            "Validation completed with {} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A single validation issue (error or warning).
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,

    /// A stable code for the issue type.
    pub code: IssueCode,

    pub message: String,

    /// Where the issue occurred.
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.context, self.message
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Suspicious but representable data.
    Warning,
    /// Data that breaks a model invariant.
    Error,
}

/// A stable code identifying the type of validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueCode {
    // Set-level
    /// `format_version` is not a semantic version.
    InvalidFormatVersion,
    /// `format_version` is newer than this crate understands.
    UnsupportedFormatVersion,

    // Image properties
    /// Width or height is zero, so bounds cannot be checked.
    MissingImageDimensions,
    EmptyFileName,

    // Class names
    DuplicateClassName,
    EmptyClassName,

    // Annotations
    /// `class_id` is negative or not an index into `class_names`.
    ClassIdOutOfRange,
    /// A bbox component is NaN or infinite.
    BBoxNotFinite,
    /// A bbox component is negative.
    BBoxNegative,
    /// Width or height is zero.
    BBoxZeroSize,
    /// The box extends past the image edge.
    BBoxOutOfBounds,
    ScoreOutOfRange,
    /// A polygon ring has an odd number of values, fewer than three points,
    /// or non-finite coordinates.
    InvalidPolygon,
    /// RLE run lengths do not add up to the mask size.
    InvalidRle,
    /// RLE mask size differs from the image size.
    RleSizeMismatch,
}

/// Where a validation issue occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueContext {
    AnnotationSet,
    ImageProperties,
    /// Entry in `class_names`.
    Class { index: usize },
    /// Entry in `annotations`.
    Annotation { index: usize },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::AnnotationSet => write!(f, "annotation set"),
            IssueContext::ImageProperties => write!(f, "image_properties"),
            IssueContext::Class { index } => write!(f, "class_names[{}]", index),
            IssueContext::Annotation { index } => write!(f, "annotations[{}]", index),
        }
    }
}
