//! Pascal VOC XML reader and writer.
//!
//! One VOC file describes one image. Boxes are stored as corner coordinates
//! (`xmin`, `ymin`, `xmax`, `ymax`) in pixels. VOC has no notion of scores
//! or segmentation masks, so those are never produced on import.
//!
//! The per-object `pose`, `truncated` and `difficult` fields are kept as the
//! custom attributes `voc_pose`, `voc_truncated` and `voc_difficult`.

use std::fmt::Write as _;

use roxmltree::Node;

use super::model::{Annotation, AnnotationSet, ImageDims, ImageProperties};
use super::BBox;
use crate::error::XlabelError;

pub const ATTR_POSE: &str = "voc_pose";
pub const ATTR_TRUNCATED: &str = "voc_truncated";
pub const ATTR_DIFFICULT: &str = "voc_difficult";
pub const ATTR_OCCLUDED: &str = "voc_occluded";

/// Custom attribute keys that VOC export writes back natively.
pub const NATIVE_ATTRIBUTES: [&str; 4] = [ATTR_POSE, ATTR_TRUNCATED, ATTR_DIFFICULT, ATTR_OCCLUDED];

const DEFAULT_FOLDER: &str = "Unknown";

/// Parses VOC XML from bytes. The input must be valid UTF-8.
pub fn from_voc_xml_slice(
    bytes: &[u8],
    seed_class_names: &[String],
) -> Result<AnnotationSet, XlabelError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| XlabelError::VocXmlParse {
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_voc_xml_str(xml, seed_class_names)
}

/// Parses one VOC annotation document.
///
/// `seed_class_names` fixes the order of known classes; names not in it
/// are appended in first-seen order.
pub fn from_voc_xml_str(
    xml: &str,
    seed_class_names: &[String],
) -> Result<AnnotationSet, XlabelError> {
    let document = roxmltree::Document::parse(xml).map_err(|source| XlabelError::VocXmlParse {
        message: source.to_string(),
    })?;

    let root = document.root_element();
    if root.tag_name().name() != "annotation" {
        return Err(voc_error("missing <annotation> root element"));
    }

    let filename = optional_child_text(root, "filename").unwrap_or_default();
    let (width, height) = match child_element(root, "size") {
        Some(size) => (
            parse_optional_u32(size, "width", "<size>")?.unwrap_or(0),
            parse_optional_u32(size, "height", "<size>")?.unwrap_or(0),
        ),
        None => (0, 0),
    };

    let mut set = AnnotationSet::new(seed_class_names.to_vec())
        .with_image_properties(ImageProperties::new(filename, width, height));

    for object in root
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = required_child_text(object, "name", "<object>")?;
        let bndbox = child_element(object, "bndbox")
            .ok_or_else(|| voc_error(format!("missing <bndbox> in <object> '{name}'")))?;

        let xmin = parse_required_f64(bndbox, "xmin", "<bndbox>")?;
        let ymin = parse_required_f64(bndbox, "ymin", "<bndbox>")?;
        let xmax = parse_required_f64(bndbox, "xmax", "<bndbox>")?;
        let ymax = parse_required_f64(bndbox, "ymax", "<bndbox>")?;

        let class_id = set.intern_class(&name);
        let mut annotation = Annotation::new(class_id, BBox::from_xyxy(xmin, ymin, xmax, ymax));

        if let Some(pose) = optional_child_text(object, "pose") {
            annotation.set_attribute(ATTR_POSE, pose);
        }
        for (tag, key) in [
            ("truncated", ATTR_TRUNCATED),
            ("difficult", ATTR_DIFFICULT),
            ("occluded", ATTR_OCCLUDED),
        ] {
            if let Some(raw) = optional_child_text(object, tag) {
                match normalize_bool_attr(&raw) {
                    Some(flag) => annotation.set_attribute(key, flag == "1"),
                    None => tracing::warn!(
                        object = %name,
                        value = %raw,
                        "ignoring non-boolean <{}>",
                        tag
                    ),
                }
            }
        }

        set.annotations.push(annotation);
    }

    Ok(set)
}

/// Renders an annotation set as a VOC document.
///
/// Width/height come from the set, or from `dims` when the set does not
/// know them. Scores, segmentation and non-VOC custom attributes are not
/// written.
pub fn to_voc_xml_string(set: &AnnotationSet, dims: Option<ImageDims>) -> Result<String, XlabelError> {
    let dims = set
        .image_properties
        .dims()
        .or(dims)
        .ok_or_else(|| XlabelError::MissingDimensions {
            context: format!("VOC export of '{}'", set.image_properties.filename),
        })?;

    let mut xml = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    let _ = writeln!(xml, "<annotation>");
    let _ = writeln!(xml, "  <folder>{}</folder>", DEFAULT_FOLDER);
    let _ = writeln!(
        xml,
        "  <filename>{}</filename>",
        xml_escape(&set.image_properties.filename)
    );
    let _ = writeln!(xml, "  <source>");
    let _ = writeln!(xml, "    <database>Unknown</database>");
    let _ = writeln!(xml, "  </source>");
    let _ = writeln!(xml, "  <size>");
    let _ = writeln!(xml, "    <width>{}</width>", dims.width);
    let _ = writeln!(xml, "    <height>{}</height>", dims.height);
    let _ = writeln!(xml, "    <depth>3</depth>");
    let _ = writeln!(xml, "  </size>");
    let _ = writeln!(xml, "  <segmented>0</segmented>");

    for (index, annotation) in set.annotations.iter().enumerate() {
        let class_name = set.class_name(annotation.class_id).ok_or_else(|| {
            voc_error(format!(
                "annotation {} has class_id {} outside class_names",
                index, annotation.class_id
            ))
        })?;

        let pose = annotation
            .attribute(ATTR_POSE)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let _ = writeln!(xml, "  <object>");
        let _ = writeln!(xml, "    <name>{}</name>", xml_escape(class_name));
        if let Some(pose) = pose {
            let _ = writeln!(xml, "    <pose>{}</pose>", xml_escape(pose));
        }
        if let Some(truncated) = flag_attr(annotation, ATTR_TRUNCATED) {
            let _ = writeln!(xml, "    <truncated>{}</truncated>", truncated);
        }
        if let Some(difficult) = flag_attr(annotation, ATTR_DIFFICULT) {
            let _ = writeln!(xml, "    <difficult>{}</difficult>", difficult);
        }
        if let Some(occluded) = flag_attr(annotation, ATTR_OCCLUDED) {
            let _ = writeln!(xml, "    <occluded>{}</occluded>", occluded);
        }

        let [xmin, ymin, xmax, ymax] = annotation.bbox.to_xyxy();
        let _ = writeln!(xml, "    <bndbox>");
        let _ = writeln!(xml, "      <xmin>{}</xmin>", xmin);
        let _ = writeln!(xml, "      <ymin>{}</ymin>", ymin);
        let _ = writeln!(xml, "      <xmax>{}</xmax>", xmax);
        let _ = writeln!(xml, "      <ymax>{}</ymax>", ymax);
        let _ = writeln!(xml, "    </bndbox>");
        let _ = writeln!(xml, "  </object>");
    }

    let _ = writeln!(xml, "</annotation>");
    Ok(xml)
}

fn flag_attr(annotation: &Annotation, key: &str) -> Option<&'static str> {
    match annotation.attribute(key)? {
        serde_json::Value::Bool(true) => Some("1"),
        serde_json::Value::Bool(false) => Some("0"),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) if v != 0.0 => Some("1"),
            Some(_) => Some("0"),
            None => None,
        },
        serde_json::Value::String(s) => normalize_bool_attr(s),
        _ => None,
    }
}

fn voc_error(message: impl Into<String>) -> XlabelError {
    XlabelError::VocXmlParse {
        message: message.into(),
    }
}

fn required_child_text(node: Node<'_, '_>, tag: &str, context: &str) -> Result<String, XlabelError> {
    optional_child_text(node, tag).ok_or_else(|| voc_error(format!("missing <{tag}> in {context}")))
}

fn parse_optional_u32(node: Node<'_, '_>, tag: &str, context: &str) -> Result<Option<u32>, XlabelError> {
    optional_child_text(node, tag)
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| {
                voc_error(format!("invalid <{tag}> value '{raw}' in {context}; expected u32"))
            })
        })
        .transpose()
}

fn parse_required_f64(node: Node<'_, '_>, tag: &str, context: &str) -> Result<f64, XlabelError> {
    let raw = required_child_text(node, tag, context)?;
    raw.parse::<f64>().map_err(|_| {
        voc_error(format!(
            "invalid <{tag}> value '{raw}' in {context}; expected floating-point number"
        ))
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn normalize_bool_attr(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some("1"),
        "false" | "no" | "0" => Some("0"),
        _ => None,
    }
}
