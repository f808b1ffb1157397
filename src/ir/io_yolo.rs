//! YOLO label reader and writer.
//!
//! A YOLO label file has one line per object:
//!
//! ```text
//! <class_id> <x_center> <y_center> <width> <height> [score]
//! ```
//!
//! Coordinates are normalized by the image width/height, so image dimensions
//! are needed in both directions. Class names live in a companion
//! `classes.txt` (one name per line) or `data.yaml` (`names:` list or map).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::model::{Annotation, AnnotationSet, ImageDims, ImageProperties};
use super::{BBox, Normalized};
use crate::error::XlabelError;

/// Decimal places written for normalized values and scores.
pub const FLOAT_PRECISION: usize = 6;

/// Largest class id accepted from label lines and `data.yaml` maps.
pub const MAX_CLASS_ID: usize = 65_535;

#[derive(Debug, PartialEq)]
pub struct YoloLabelRow {
    pub class_id: usize,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    pub score: Option<f64>,
}

/// Parses a YOLO label file into an annotation set.
///
/// When `class_names` is empty, names `class_0..class_N` are generated up to
/// the largest id seen. Otherwise every class id must index into it.
pub fn from_yolo_str(
    text: &str,
    class_names: &[String],
    dims: ImageDims,
    filename: &str,
) -> Result<AnnotationSet, XlabelError> {
    let mut rows = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        if let Some(row) = parse_label_line(line, line_idx + 1)? {
            rows.push((line_idx + 1, row));
        }
    }

    let class_names = if class_names.is_empty() {
        infer_class_names(rows.iter().map(|(_, row)| row.class_id))
    } else {
        class_names.to_vec()
    };

    let mut set = AnnotationSet::new(class_names)
        .with_image_properties(ImageProperties::new(filename, dims.width, dims.height));

    let (img_w, img_h) = (f64::from(dims.width), f64::from(dims.height));
    for (line, row) in rows {
        if row.class_id >= set.class_names.len() {
            return Err(XlabelError::YoloLabelParse {
                line,
                message: format!(
                    "class_id {} is out of range for class list with {} class(es)",
                    row.class_id,
                    set.class_names.len()
                ),
            });
        }

        let bbox = BBox::<Normalized>::from_cxcywh(row.cx, row.cy, row.w, row.h).to_pixel(img_w, img_h);
        let mut annotation = Annotation::new(row.class_id as i64, bbox);
        annotation.score = row.score;
        set.annotations.push(annotation);
    }

    Ok(set)
}

/// Renders label lines for `set`.
///
/// Values are clamped into `[0, 1]` and written with six decimals; a score
/// becomes the sixth column. Segmentation and custom attributes are not
/// representable and are skipped.
pub fn to_yolo_string(set: &AnnotationSet, dims: Option<ImageDims>) -> Result<String, XlabelError> {
    let dims = set
        .image_properties
        .dims()
        .or(dims)
        .ok_or_else(|| XlabelError::MissingDimensions {
            context: format!("YOLO export of '{}'", set.image_properties.filename),
        })?;
    let (img_w, img_h) = (f64::from(dims.width), f64::from(dims.height));

    let mut out = String::new();
    for (index, ann) in set.annotations.iter().enumerate() {
        let class_id = ann
            .class_index()
            .filter(|idx| *idx < set.class_names.len())
            .ok_or_else(|| XlabelError::YoloClassList {
                message: format!(
                    "annotation {} has class_id {} outside class_names",
                    index, ann.class_id
                ),
            })?;

        let (normalized, clamped) = ann.bbox.to_normalized(img_w, img_h).clamp_unit();
        if clamped {
            tracing::warn!(annotation = index, "clamped YOLO coordinates into [0, 1]");
        }
        let [cx, cy, w, h] = normalized.to_cxcywh();

        let _ = write!(
            out,
            "{} {:.p$} {:.p$} {:.p$} {:.p$}",
            class_id,
            cx,
            cy,
            w,
            h,
            p = FLOAT_PRECISION
        );
        if let Some(score) = ann.score {
            let _ = write!(out, " {:.p$}", score, p = FLOAT_PRECISION);
        }
        out.push('\n');
    }

    Ok(out)
}

/// Returns true if exporting `ann` to YOLO would clamp any coordinate.
pub fn needs_clamping(ann: &Annotation, dims: ImageDims) -> bool {
    ann.bbox
        .to_normalized(f64::from(dims.width), f64::from(dims.height))
        .clamp_unit()
        .1
}

pub fn parse_label_line(line: &str, line_num: usize) -> Result<Option<YoloLabelRow>, XlabelError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Take at most 7 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(7).collect();

    if tokens.len() < 5 {
        return Err(XlabelError::YoloLabelParse {
            line: line_num,
            message: format!("expected 5 or 6 tokens, found {}", tokens.len()),
        });
    }

    if tokens.len() > 6 {
        return Err(XlabelError::YoloLabelParse {
            line: line_num,
            message: "segmentation/pose rows are not supported; expected class, 4 box values and an optional score"
                .to_string(),
        });
    }

    let class_id = tokens[0]
        .parse::<usize>()
        .map_err(|_| XlabelError::YoloLabelParse {
            line: line_num,
            message: format!(
                "invalid class_id '{}'; expected non-negative integer",
                tokens[0]
            ),
        })?;
    if class_id > MAX_CLASS_ID {
        return Err(XlabelError::YoloLabelParse {
            line: line_num,
            message: format!("class_id {class_id} exceeds the limit of {MAX_CLASS_ID}"),
        });
    }

    let cx = parse_f64_token(tokens[1], "x_center", line_num)?;
    let cy = parse_f64_token(tokens[2], "y_center", line_num)?;
    let w = parse_f64_token(tokens[3], "width", line_num)?;
    let h = parse_f64_token(tokens[4], "height", line_num)?;
    let score = tokens
        .get(5)
        .map(|raw| parse_f64_token(raw, "score", line_num))
        .transpose()?;

    Ok(Some(YoloLabelRow {
        class_id,
        cx,
        cy,
        w,
        h,
        score,
    }))
}

fn parse_f64_token(raw: &str, field_name: &str, line_num: usize) -> Result<f64, XlabelError> {
    raw.parse::<f64>()
        .map_err(|_| XlabelError::YoloLabelParse {
            line: line_num,
            message: format!("invalid {field_name} '{raw}'; expected floating-point number"),
        })
}

fn infer_class_names(class_ids: impl Iterator<Item = usize>) -> Vec<String> {
    match class_ids.max() {
        Some(max_id) => (0..=max_id).map(|id| format!("class_{}", id)).collect(),
        None => Vec::new(),
    }
}

// ============================================================================
// Class lists
// ============================================================================

/// Reads a class list from `classes.txt` or `data.yaml`/`data.yml`.
pub fn read_class_list_file(path: &Path) -> Result<Vec<String>, XlabelError> {
    let data = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        parse_data_yaml_names(&data)
    } else {
        parse_classes_txt(&data)
    }
}

pub fn parse_classes_txt(data: &str) -> Result<Vec<String>, XlabelError> {
    let mut names = Vec::new();

    for (line_idx, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            // A trailing blank line is common; blank lines in between would shift ids.
            if data.lines().skip(line_idx).all(|rest| rest.trim().is_empty()) {
                break;
            }
            return Err(XlabelError::YoloClassList {
                message: format!("line {} is empty", line_idx + 1),
            });
        }
        names.push(trimmed.to_string());
    }

    Ok(names)
}

#[derive(Debug, Deserialize)]
struct DataYaml {
    names: DataYamlNames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

pub fn parse_data_yaml_names(data: &str) -> Result<Vec<String>, XlabelError> {
    let parsed: DataYaml = serde_yaml::from_str(data).map_err(|source| XlabelError::YoloClassList {
        message: format!("invalid data.yaml: {source}"),
    })?;

    let names = match parsed.names {
        DataYamlNames::Sequence(names) => names,
        DataYamlNames::Mapping(mapping) => {
            let len = match mapping.keys().next_back() {
                Some(&max) if max > MAX_CLASS_ID => {
                    return Err(XlabelError::YoloClassList {
                        message: format!("class index {max} exceeds the limit of {MAX_CLASS_ID}"),
                    });
                }
                Some(&max) => max + 1,
                None => 0,
            };
            let mut names = vec![String::new(); len];
            for (index, name) in mapping {
                names[index] = name;
            }
            for (index, name) in names.iter_mut().enumerate() {
                if name.trim().is_empty() {
                    *name = format!("class_{}", index);
                }
            }
            names
        }
    };

    Ok(names)
}

pub fn to_classes_txt(class_names: &[String]) -> String {
    let mut out = String::new();
    for name in class_names {
        out.push_str(name);
        out.push('\n');
    }
    out
}

pub fn to_data_yaml(class_names: &[String]) -> String {
    let mut yaml = format!("nc: {}\nnames:\n", class_names.len());
    for (idx, name) in class_names.iter().enumerate() {
        let _ = writeln!(yaml, "  {}: {}", idx, yaml_single_quoted(name));
    }
    yaml
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Fuzz-only entrypoint for YOLO single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) -> Result<(), XlabelError> {
    let _ = parse_label_line(input, 1)?;
    Ok(())
}

/// Fuzz-only entrypoint for whole label files and `data.yaml` class lists.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_file(input: &str) -> Result<(), XlabelError> {
    let _ = parse_data_yaml_names(input);
    let _ = from_yolo_str(input, &[], ImageDims::new(640, 480), "fuzz.png")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_label_line_accepts_valid_rows() {
        let parsed = parse_label_line("2 0.5 0.25 0.3 0.1", 1)
            .expect("parse should succeed")
            .expect("line should produce a row");

        assert_eq!(
            parsed,
            YoloLabelRow {
                class_id: 2,
                cx: 0.5,
                cy: 0.25,
                w: 0.3,
                h: 0.1,
                score: None,
            }
        );
    }

    #[test]
    fn parse_label_line_reads_score_column() {
        let parsed = parse_label_line("0 0.5 0.5 0.1 0.1 0.87", 1)
            .expect("parse should succeed")
            .expect("row");
        assert_eq!(parsed.score, Some(0.87));
    }

    #[test]
    fn parse_label_line_skips_empty_rows() {
        assert!(parse_label_line("   ", 2).expect("parse").is_none());
    }

    #[test]
    fn parse_label_line_rejects_bad_rows() {
        for (line, bad) in [
            ("0 0.1 0.2", "short"),
            ("0 0.1 0.2 0.3 0.4 0.5 0.6", "polygon"),
            ("-1 0.1 0.2 0.3 0.4", "negative class"),
            ("0 x 0.2 0.3 0.4", "non-numeric"),
        ] {
            let err = parse_label_line(line, 7).unwrap_err();
            assert!(
                matches!(err, XlabelError::YoloLabelParse { line: 7, .. }),
                "{bad} row should fail"
            );
        }
    }

    #[test]
    fn denormalizes_into_pixel_boxes() {
        let set = from_yolo_str(
            "0 0.5 0.5 0.2 0.3\n",
            &names(&["cat"]),
            ImageDims::new(200, 100),
            "a.png",
        )
        .expect("import yolo");

        let [x, y, w, h] = set.annotations[0].bbox.to_xywh();
        for (got, want) in [(x, 80.0), (y, 35.0), (w, 40.0), (h, 30.0)] {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        assert_eq!(set.image_properties, ImageProperties::new("a.png", 200, 100));
    }

    #[test]
    fn infers_class_names_when_list_is_empty() {
        let set = from_yolo_str("2 0.5 0.5 0.5 0.5\n0 0.2 0.2 0.1 0.1\n", &[], ImageDims::new(10, 10), "")
            .expect("import yolo");
        assert_eq!(set.class_names, vec!["class_0", "class_1", "class_2"]);
    }

    #[test]
    fn rejects_class_id_outside_list() {
        let err = from_yolo_str("\n3 0.5 0.5 0.1 0.1\n", &names(&["a"]), ImageDims::new(10, 10), "")
            .unwrap_err();
        assert!(matches!(err, XlabelError::YoloLabelParse { line: 2, .. }));
    }

    #[test]
    fn export_normalizes_clamps_and_writes_score() {
        let set = AnnotationSet::new(names(&["cat", "dog"]))
            .with_image_properties(ImageProperties::new("a.png", 200, 100))
            .with_annotation(Annotation::new(1, BBox::from_xywh(80.0, 35.0, 40.0, 30.0)).with_score(0.5))
            .with_annotation(Annotation::new(0, BBox::from_xywh(180.0, 0.0, 100.0, 10.0)));

        let text = to_yolo_string(&set, None).expect("export yolo");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1 0.500000 0.500000 0.200000 0.300000 0.500000");
        assert_eq!(lines[1], "0 1.000000 0.050000 0.500000 0.100000");
        assert!(needs_clamping(&set.annotations[1], ImageDims::new(200, 100)));
        assert!(!needs_clamping(&set.annotations[0], ImageDims::new(200, 100)));
    }

    #[test]
    fn export_needs_dimensions() {
        let set = AnnotationSet::new(names(&["a"]));
        let err = to_yolo_string(&set, None).unwrap_err();
        assert!(matches!(err, XlabelError::MissingDimensions { .. }));
    }

    #[test]
    fn classes_txt_rules() {
        assert_eq!(parse_classes_txt("cat\ndog\n\n").expect("parse"), names(&["cat", "dog"]));
        assert!(parse_classes_txt("cat\n\ndog\n").is_err());
    }

    #[test]
    fn data_yaml_accepts_list_and_map() {
        assert_eq!(
            parse_data_yaml_names("names:\n  - cat\n  - dog\n").expect("list"),
            names(&["cat", "dog"])
        );
        assert_eq!(
            parse_data_yaml_names("names:\n  0: person\n  2: bicycle\n").expect("map"),
            names(&["person", "class_1", "bicycle"])
        );
    }

    #[test]
    fn data_yaml_output_reparses() {
        let list = names(&["it's", "dog"]);
        let yaml = to_data_yaml(&list);
        assert!(yaml.contains("0: 'it''s'"));
        assert_eq!(parse_data_yaml_names(&yaml).expect("reparse"), list);
        assert_eq!(parse_classes_txt(&to_classes_txt(&list)).expect("reparse"), list);
    }

    #[test]
    fn huge_class_id_is_rejected_before_inferring_names() {
        let err = from_yolo_str(
            "18446744073709551615 0.5 0.5 0.1 0.1",
            &[],
            ImageDims::new(10, 10),
            "",
        )
        .unwrap_err();
        assert!(matches!(err, XlabelError::YoloLabelParse { line: 1, .. }));

        let text = format!("{} 0.5 0.5 0.1 0.1", MAX_CLASS_ID + 1);
        assert!(parse_label_line(&text, 3).is_err());
        assert!(parse_label_line(&format!("{MAX_CLASS_ID} 0.5 0.5 0.1 0.1"), 1).is_ok());
    }

    #[test]
    fn data_yaml_rejects_out_of_bounds_index() {
        for yaml in [
            "names:\n  18446744073709551615: a\n",
            "names:\n  0: a\n  70000: b\n",
        ] {
            let err = parse_data_yaml_names(yaml).unwrap_err();
            assert!(matches!(err, XlabelError::YoloClassList { .. }), "{yaml}");
        }
    }
}
