//! COCO JSON reader and writer.
//!
//! COCO bounding boxes use `[x, y, width, height]` in absolute pixels, which
//! is exactly the canonical bbox layout, so boxes pass through unchanged.
//!
//! A COCO file describes many images while an [`AnnotationSet`] describes
//! one. Import therefore selects a single image; export goes through
//! [`CocoAggregator`], which merges any number of sets into one file with
//! globally unique image/annotation ids and one category per class name.
//!
//! # Deterministic Output
//!
//! Ids are assigned in insertion order starting at 1, and categories keep
//! the order in which class names were first seen. An annotation carrying
//! `coco_annotation_id` keeps that id unless it is already taken.
//!
//! Import records `coco_annotation_id` only when the source id differs from
//! the 1-based position of the annotation within its image, and
//! `coco_iscrowd` only when it is non-zero. A set exported and imported
//! again therefore comes back with the attributes it started with.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::model::{Annotation, AnnotationSet, CustomAttributes, ImageDims, ImageProperties};
use super::{BBox, Segmentation};
use crate::error::XlabelError;

/// Custom attribute holding the source annotation id when it is not the
/// sequential one.
pub const ATTR_ANNOTATION_ID: &str = "coco_annotation_id";
/// Custom attribute holding a non-zero `iscrowd` flag.
pub const ATTR_ISCROWD: &str = "coco_iscrowd";

const DEFAULT_LICENSE_ID: u64 = 1;

// ============================================================================
// COCO Schema Types
// ============================================================================

/// Top-level COCO dataset structure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<CocoInfo>,

    #[serde(default)]
    pub licenses: Vec<CocoLicense>,

    pub images: Vec<CocoImage>,

    pub annotations: Vec<CocoAnnotation>,

    pub categories: Vec<CocoCategory>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CocoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoLicense {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,

    /// `[x, y, width, height]`, top-left corner in pixels.
    pub bbox: [f64; 4],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iscrowd: Option<u8>,

    /// Polygons or RLE. COCO files often use `[]` for "none".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,

    /// Detection confidence (COCO results files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Free-form attributes, as written by CVAT and this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<CustomAttributes>,
}

// ============================================================================
// Public API
// ============================================================================

/// Parses a COCO JSON document.
pub fn parse_coco_slice(bytes: &[u8]) -> Result<CocoDataset, XlabelError> {
    serde_json::from_slice(bytes).map_err(|source| XlabelError::CocoJsonParse { source })
}

/// Imports the annotations of one image from a COCO document.
///
/// The image is chosen by `image_filename` (matched against `file_name`,
/// or its final path component). Without a filename the document must
/// contain exactly one image.
pub fn from_coco_slice(
    bytes: &[u8],
    image_filename: Option<&str>,
    seed_class_names: &[String],
) -> Result<AnnotationSet, XlabelError> {
    let coco = parse_coco_slice(bytes)?;
    coco_to_annotation_set(&coco, image_filename, seed_class_names)
}

/// Exports a single annotation set as a COCO document.
pub fn to_coco_string(set: &AnnotationSet, dims: Option<ImageDims>) -> Result<String, XlabelError> {
    let mut aggregator = CocoAggregator::new();
    aggregator.add(set, dims)?;
    aggregator.to_json_string()
}

// ============================================================================
// Conversion: COCO -> canonical
// ============================================================================

/// Converts the annotations of one image in `coco` into an annotation set.
pub fn coco_to_annotation_set(
    coco: &CocoDataset,
    image_filename: Option<&str>,
    seed_class_names: &[String],
) -> Result<AnnotationSet, XlabelError> {
    let image = select_image(coco, image_filename)?;

    let mut set = AnnotationSet::new(seed_class_names.to_vec()).with_image_properties(
        ImageProperties::new(image.file_name.clone(), image.width, image.height),
    );

    let mut class_by_category: HashMap<u64, i64> = HashMap::new();
    for category in &coco.categories {
        if category.name.is_empty() {
            tracing::warn!(category_id = category.id, "skipping COCO category with empty name");
            continue;
        }
        let class_id = set.intern_class(&category.name);
        class_by_category.insert(category.id, class_id);
    }

    let image_annotations = coco.annotations.iter().filter(|a| a.image_id == image.id);
    for (position, ann) in (1u64..).zip(image_annotations) {
        let class_id = class_by_category.get(&ann.category_id).copied().ok_or_else(|| {
            XlabelError::CocoConvert {
                message: format!(
                    "annotation {} references unknown category {}",
                    ann.id, ann.category_id
                ),
            }
        })?;

        let [x, y, w, h] = ann.bbox;
        let mut annotation = Annotation::new(class_id, BBox::from_xywh(x, y, w, h));
        annotation.score = ann.score;
        annotation.segmentation = ann
            .segmentation
            .clone()
            .and_then(|seg| import_segmentation(seg, ann.id));

        let mut attrs = ann.attributes.clone().unwrap_or_default();
        if ann.id != position {
            attrs.insert(ATTR_ANNOTATION_ID.to_string(), ann.id.into());
        }
        if let Some(iscrowd) = ann.iscrowd.filter(|flag| *flag != 0) {
            attrs.insert(ATTR_ISCROWD.to_string(), iscrowd.into());
        }
        annotation.custom_attributes = (!attrs.is_empty()).then_some(attrs);

        set.annotations.push(annotation);
    }

    tracing::debug!(
        image = %image.file_name,
        annotations = set.annotations.len(),
        classes = set.class_names.len(),
        "imported COCO image"
    );
    Ok(set)
}

fn select_image<'a>(
    coco: &'a CocoDataset,
    image_filename: Option<&str>,
) -> Result<&'a CocoImage, XlabelError> {
    match image_filename {
        Some(wanted) => coco
            .images
            .iter()
            .find(|img| img.file_name == wanted)
            .or_else(|| {
                coco.images
                    .iter()
                    .find(|img| file_name_component(&img.file_name) == file_name_component(wanted))
            })
            .ok_or_else(|| XlabelError::CocoConvert {
                message: format!("image '{}' not found in COCO images list", wanted),
            }),
        None => match coco.images.as_slice() {
            [only] => Ok(only),
            images => Err(XlabelError::CocoConvert {
                message: format!(
                    "COCO file lists {} image(s); an image filename is required to pick one",
                    images.len()
                ),
            }),
        },
    }
}

fn file_name_component(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Drops empty polygon lists and malformed rings.
fn import_segmentation(seg: Segmentation, annotation_id: u64) -> Option<Segmentation> {
    match seg {
        Segmentation::Polygon(rings) => {
            let total = rings.len();
            let valid: Vec<Vec<f64>> = rings
                .into_iter()
                .filter(|ring| ring.len() >= 6 && ring.len() % 2 == 0)
                .collect();
            if valid.len() < total {
                tracing::warn!(
                    annotation_id,
                    skipped = total - valid.len(),
                    "skipping polygon parts with fewer than 3 points or odd length"
                );
            }
            (!valid.is_empty()).then_some(Segmentation::Polygon(valid))
        }
        rle @ Segmentation::Rle(_) => Some(rle),
    }
}

// ============================================================================
// Conversion: canonical -> COCO
// ============================================================================

/// Merges annotation sets into one COCO document.
///
/// Categories are shared across images by exact class name.
#[derive(Debug)]
pub struct CocoAggregator {
    images: Vec<CocoImage>,
    annotations: Vec<CocoAnnotation>,
    categories: Vec<CocoCategory>,
    category_ids: HashMap<String, u64>,
    next_image_id: u64,
    next_annotation_id: u64,
    used_annotation_ids: HashSet<u64>,
}

impl Default for CocoAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CocoAggregator {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            annotations: Vec::new(),
            categories: Vec::new(),
            category_ids: HashMap::new(),
            next_image_id: 1,
            next_annotation_id: 1,
            used_annotation_ids: HashSet::new(),
        }
    }

    /// Adds one image and its annotations. Returns the assigned image id.
    ///
    /// Nothing is added if the set cannot be converted.
    pub fn add(&mut self, set: &AnnotationSet, dims: Option<ImageDims>) -> Result<u64, XlabelError> {
        let dims = set
            .image_properties
            .dims()
            .or(dims)
            .ok_or_else(|| XlabelError::MissingDimensions {
                context: format!("COCO export of '{}'", set.image_properties.filename),
            })?;

        for ann in &set.annotations {
            if set.class_name(ann.class_id).is_none() {
                return Err(XlabelError::CocoConvert {
                    message: format!(
                        "class_id {} is out of range for {} class name(s)",
                        ann.class_id,
                        set.class_names.len()
                    ),
                });
            }
        }

        let local_to_global: Vec<u64> = set
            .class_names
            .iter()
            .map(|name| self.category_id_for(name))
            .collect();

        let image_id = self.next_image_id;
        self.next_image_id += 1;
        self.images.push(CocoImage {
            id: image_id,
            width: dims.width,
            height: dims.height,
            file_name: set.image_properties.filename.clone(),
            license: Some(DEFAULT_LICENSE_ID),
        });

        for ann in &set.annotations {
            let category_id = ann
                .class_index()
                .and_then(|idx| local_to_global.get(idx))
                .copied()
                .ok_or_else(|| XlabelError::CocoConvert {
                    message: format!("class_id {} has no category", ann.class_id),
                })?;
            let coco_ann = self.annotation_entry(ann, image_id, category_id);
            self.annotations.push(coco_ann);
        }

        Ok(image_id)
    }

    fn category_id_for(&mut self, name: &str) -> u64 {
        if let Some(id) = self.category_ids.get(name) {
            return *id;
        }
        let id = self.categories.len() as u64 + 1;
        self.categories.push(CocoCategory {
            id,
            name: name.to_string(),
            supercategory: None,
        });
        self.category_ids.insert(name.to_string(), id);
        id
    }

    fn annotation_entry(&mut self, ann: &Annotation, image_id: u64, category_id: u64) -> CocoAnnotation {
        let preferred = ann
            .attribute(ATTR_ANNOTATION_ID)
            .and_then(serde_json::Value::as_u64)
            .filter(|id| *id > 0 && !self.used_annotation_ids.contains(id));
        let id = match preferred {
            Some(id) => id,
            None => {
                while self.used_annotation_ids.contains(&self.next_annotation_id) {
                    self.next_annotation_id += 1;
                }
                let id = self.next_annotation_id;
                self.next_annotation_id += 1;
                id
            }
        };
        self.used_annotation_ids.insert(id);

        let iscrowd = ann
            .attribute(ATTR_ISCROWD)
            .and_then(|v| v.as_u64().or_else(|| v.as_bool().map(u64::from)))
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(0);

        let attributes = ann.custom_attributes.as_ref().and_then(|attrs| {
            let kept: CustomAttributes = attrs
                .iter()
                .filter(|(key, _)| key.as_str() != ATTR_ISCROWD && key.as_str() != ATTR_ANNOTATION_ID)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            (!kept.is_empty()).then_some(kept)
        });

        CocoAnnotation {
            id,
            image_id,
            category_id,
            bbox: ann.bbox.to_xywh(),
            area: Some(ann.bbox.area()),
            iscrowd: Some(iscrowd),
            segmentation: Some(
                ann.segmentation
                    .clone()
                    .unwrap_or(Segmentation::Polygon(Vec::new())),
            ),
            score: ann.score,
            attributes,
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Finishes aggregation.
    pub fn finish(self) -> CocoDataset {
        CocoDataset {
            info: Some(CocoInfo {
                description: Some("Exported from XLabel annotations".to_string()),
                version: Some("1.0".to_string()),
                contributor: Some(format!("xlabel {}", env!("CARGO_PKG_VERSION"))),
                url: None,
            }),
            licenses: vec![CocoLicense {
                id: DEFAULT_LICENSE_ID,
                name: "Unknown".to_string(),
                url: None,
            }],
            images: self.images,
            annotations: self.annotations,
            categories: self.categories,
        }
    }

    /// Finishes aggregation and renders pretty-printed JSON.
    pub fn to_json_string(self) -> Result<String, XlabelError> {
        serde_json::to_string_pretty(&self.finish()).map_err(XlabelError::Serialize)
    }
}

// ============================================================================
// Tests
// ============================================================================
