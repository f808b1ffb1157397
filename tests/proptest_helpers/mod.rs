#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use xlabel::ir::{Annotation, AnnotationSet, BBox, CustomAttributes, ImageProperties, Pixel, Segmentation};

pub const EPS_COCO: f64 = 1e-10;
pub const EPS_VOC: f64 = 1e-9;

pub fn eps_yolo(image_w: u32, image_h: u32) -> f64 {
    image_w.max(image_h) as f64 * 1e-6
}

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnnSem {
    pub class_name: String,
    pub bbox: [f64; 4],
}

/// Annotation semantics in storage order: resolved class name plus box.
pub fn ann_semantics(set: &AnnotationSet) -> Result<Vec<AnnSem>, String> {
    set.annotations
        .iter()
        .enumerate()
        .map(|(idx, ann)| {
            let class_name = set.class_name(ann.class_id).ok_or_else(|| {
                format!(
                    "annotation {} references missing class_id {}",
                    idx, ann.class_id
                )
            })?;
            Ok(AnnSem {
                class_name: class_name.to_string(),
                bbox: ann.bbox.to_xywh(),
            })
        })
        .collect()
}

pub fn assert_annotations_equivalent(
    a: &AnnotationSet,
    b: &AnnotationSet,
    eps: f64,
) -> Result<(), String> {
    let left = ann_semantics(a)?;
    let right = ann_semantics(b)?;

    if left.len() != right.len() {
        return Err(format!(
            "annotation count mismatch: left={} right={}",
            left.len(),
            right.len()
        ));
    }

    for (idx, (l, r)) in left.iter().zip(&right).enumerate() {
        let close = l
            .bbox
            .iter()
            .zip(r.bbox)
            .all(|(x, y)| (x - y).abs() <= eps);
        if l.class_name != r.class_name || !close {
            return Err(format!(
                "annotation {} differs: left={:?} right={:?} eps={}",
                idx, l, r, eps
            ));
        }
    }

    Ok(())
}

/// Compares `custom_attributes` annotation by annotation, including key order.
pub fn assert_custom_attributes_equal(a: &AnnotationSet, b: &AnnotationSet) -> Result<(), String> {
    for (idx, (l, r)) in a.annotations.iter().zip(&b.annotations).enumerate() {
        let keys = |attrs: &Option<CustomAttributes>| -> Option<Vec<String>> {
            attrs.as_ref().map(|m| m.keys().cloned().collect())
        };
        if l.custom_attributes != r.custom_attributes
            || keys(&l.custom_attributes) != keys(&r.custom_attributes)
        {
            return Err(format!(
                "annotation {} attributes differ: left={:?} right={:?}",
                idx, l.custom_attributes, r.custom_attributes
            ));
        }
    }
    Ok(())
}

/// Integer-aligned box fully inside a `width` x `height` image.
pub fn arb_bbox_within(width: u32, height: u32) -> BoxedStrategy<BBox<Pixel>> {
    (any::<u32>(), any::<u32>(), any::<u32>(), any::<u32>())
        .prop_map(move |(sx, sy, sw, sh)| bbox_from_seed(width, height, sx, sy, sw, sh))
        .boxed()
}

/// Annotation sets with known dimensions, 1..=`max_classes` unique class
/// names and up to `max_anns` in-bounds annotations.
pub fn arb_annotation_set(max_classes: usize, max_anns: usize) -> BoxedStrategy<AnnotationSet> {
    assert!(max_classes > 0, "max_classes must be > 0");

    (
        image_file_name_strategy(),
        (2u32..=4096, 2u32..=4096),
        proptest::collection::btree_set(class_name_strategy(), 1..=max_classes),
    )
        .prop_flat_map(move |(filename, (width, height), classes)| {
            let class_names: Vec<String> = classes.into_iter().collect();
            let class_count = class_names.len();
            (
                Just(filename),
                Just((width, height)),
                Just(class_names),
                proptest::collection::vec(
                    (0..class_count, arb_bbox_within(width, height)),
                    0..=max_anns,
                ),
            )
        })
        .prop_map(|(filename, (width, height), class_names, anns)| {
            let mut set = AnnotationSet::new(class_names)
                .with_image_properties(ImageProperties::new(filename, width, height));
            for (class_idx, bbox) in anns {
                set.annotations.push(Annotation::new(class_idx as i64, bbox));
            }
            set
        })
        .boxed()
}

/// Like [`arb_annotation_set`], with a score on every annotation.
pub fn arb_annotation_set_with_scores(
    max_classes: usize,
    max_anns: usize,
) -> BoxedStrategy<AnnotationSet> {
    arb_annotation_set(max_classes, max_anns)
        .prop_flat_map(|set| {
            let ann_count = set.annotations.len();
            proptest::collection::vec(0u16..=1000u16, ann_count..=ann_count).prop_map(
                move |raw_scores| {
                    let mut scored = set.clone();
                    for (ann, raw) in scored.annotations.iter_mut().zip(raw_scores) {
                        ann.score = Some(raw as f64 / 1000.0);
                    }
                    scored
                },
            )
        })
        .boxed()
}

/// Like [`arb_annotation_set`], where some annotations also carry a polygon
/// tracing their box and some carry custom attributes. Attribute keys never
/// use a format prefix (`coco_`, `voc_`).
pub fn arb_annotation_set_with_extras(
    max_classes: usize,
    max_anns: usize,
) -> BoxedStrategy<AnnotationSet> {
    arb_annotation_set(max_classes, max_anns)
        .prop_flat_map(|set| {
            let ann_count = set.annotations.len();
            proptest::collection::vec(
                (any::<bool>(), proptest::option::of(arb_custom_attributes())),
                ann_count..=ann_count,
            )
            .prop_map(move |extras| {
                let mut extended = set.clone();
                for (ann, (with_polygon, attrs)) in extended.annotations.iter_mut().zip(extras) {
                    if with_polygon {
                        let [xmin, ymin, xmax, ymax] = ann.bbox.to_xyxy();
                        ann.segmentation = Some(Segmentation::polygon(vec![
                            xmin, ymin, xmax, ymin, xmax, ymax, xmin, ymax,
                        ]));
                    }
                    ann.custom_attributes = attrs;
                }
                extended
            })
        })
        .boxed()
}

fn arb_custom_attributes() -> BoxedStrategy<CustomAttributes> {
    let value = prop_oneof![
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i32>().prop_map(serde_json::Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(serde_json::Value::from),
    ];
    proptest::collection::vec(("attr_[a-z]{1,8}", value), 1..4)
        .prop_map(|pairs| pairs.into_iter().collect())
        .boxed()
}

fn image_file_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z0-9_]{1,12}\\.png")
        .expect("valid filename regex")
        .boxed()
}

fn class_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z]{1,20}")
        .expect("valid class name regex")
        .boxed()
}

fn bbox_from_seed(width: u32, height: u32, sx: u32, sy: u32, sw: u32, sh: u32) -> BBox<Pixel> {
    let xmin = sx % (width - 1);
    let ymin = sy % (height - 1);
    let xmax = xmin + 1 + (sw % (width - xmin));
    let ymax = ymin + 1 + (sh % (height - ymin));

    BBox::from_xyxy(xmin as f64, ymin as f64, xmax as f64, ymax as f64)
}
