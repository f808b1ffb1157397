//! The canonical annotation model embedded in XLabel PNGs.
//!
//! One [`AnnotationSet`] describes one image. Every format converter maps to
//! and from this shape, and its JSON form is both the PNG chunk payload and
//! the sidecar file format.

use serde::{Deserialize, Serialize};

use super::bbox::BBox;
use super::segmentation::Segmentation;
use super::space::Pixel;

/// Schema version written by this crate when the caller does not set one.
pub const DEFAULT_FORMAT_VERSION: &str = "0.2.0";

/// Free-form per-annotation attributes. Insertion order is preserved.
pub type CustomAttributes = serde_json::Map<String, serde_json::Value>;

/// All annotations for a single image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    /// Semantic version of the schema this set was written with.
    pub format_version: String,

    #[serde(default)]
    pub image_properties: ImageProperties,

    /// Class labels; the index of a name is its `class_id`.
    pub class_names: Vec<String>,

    pub annotations: Vec<Annotation>,
}

impl AnnotationSet {
    /// Creates an empty set with the default schema version.
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
            image_properties: ImageProperties::default(),
            class_names,
            annotations: Vec::new(),
        }
    }

    pub fn with_image_properties(mut self, image_properties: ImageProperties) -> Self {
        self.image_properties = image_properties;
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Looks up the class name for an annotation's `class_id`.
    pub fn class_name(&self, class_id: i64) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.class_names.get(idx))
            .map(String::as_str)
    }

    /// Returns the `class_id` for `name`, appending it to `class_names` if it
    /// has not been seen yet.
    pub fn intern_class(&mut self, name: &str) -> i64 {
        let idx = match self.class_names.iter().position(|n| n == name) {
            Some(idx) => idx,
            None => {
                self.class_names.push(name.to_string());
                self.class_names.len() - 1
            }
        };
        idx as i64
    }
}

/// Host image metadata. Zero width/height means "unknown".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProperties {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl ImageProperties {
    pub fn new(filename: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            filename: filename.into(),
            width,
            height,
        }
    }

    /// Returns the dimensions if both are known.
    pub fn dims(&self) -> Option<ImageDims> {
        (self.width > 0 && self.height > 0).then_some(ImageDims {
            width: self.width,
            height: self.height,
        })
    }
}

/// Pixel dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

impl ImageDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One labelled object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Index into [`AnnotationSet::class_names`]. Signed so that bad input
    /// reaches validation instead of failing deserialization.
    pub class_id: i64,

    /// `[xmin, ymin, width, height]` in pixels.
    pub bbox: BBox<Pixel>,

    /// Detector confidence in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<CustomAttributes>,
}

impl Annotation {
    pub fn new(class_id: i64, bbox: BBox<Pixel>) -> Self {
        Self {
            class_id,
            bbox,
            score: None,
            segmentation: None,
            custom_attributes: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = Some(segmentation);
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.custom_attributes
            .get_or_insert_with(CustomAttributes::new)
            .insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom_attributes.as_ref().and_then(|a| a.get(key))
    }

    /// `class_id` as an index, if it is non-negative.
    pub fn class_index(&self) -> Option<usize> {
        usize::try_from(self.class_id).ok()
    }
}
