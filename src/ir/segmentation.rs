//! Segmentation masks: polygon rings or run-length encoding.

use serde::{Deserialize, Serialize};

/// An instance mask attached to an annotation.
///
/// Written in the COCO shape: polygons as a list of rings, RLE as an object
/// with `size` and `counts`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// One or more rings, each a flat `[x1, y1, x2, y2, ...]` list in pixels.
    Polygon(Vec<Vec<f64>>),
    Rle(RleMask),
}

/// Run-length encoded binary mask.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RleMask {
    /// Mask size as `[height, width]`.
    #[serde(alias = "rle_size")]
    pub size: [u32; 2],
    #[serde(alias = "rle_counts")]
    pub counts: RleCounts,
}

/// RLE run lengths, either as plain integers or as the COCO compressed string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RleCounts {
    Uncompressed(Vec<u32>),
    Compressed(String),
}

impl Segmentation {
    /// Single-ring polygon from a flat coordinate list.
    pub fn polygon(points: Vec<f64>) -> Self {
        Segmentation::Polygon(vec![points])
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Segmentation::Polygon(_) => "polygon",
            Segmentation::Rle(_) => "rle",
        }
    }
}

impl RleMask {
    pub fn height(&self) -> u32 {
        self.size[0]
    }

    pub fn width(&self) -> u32 {
        self.size[1]
    }

    /// Sum of the run lengths, when they are stored uncompressed.
    pub fn uncompressed_total(&self) -> Option<u64> {
        match &self.counts {
            RleCounts::Uncompressed(runs) => Some(runs.iter().map(|&r| u64::from(r)).sum()),
            RleCounts::Compressed(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for Segmentation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Rings(Vec<Vec<f64>>),
            Flat(Vec<f64>),
            Rle(RleMask),
        }

        match Wire::deserialize(deserializer).map_err(|_| {
            serde::de::Error::custom(
                "segmentation must be a polygon (list of x,y lists) or an RLE object with size and counts",
            )
        })? {
            Wire::Rings(rings) => Ok(Segmentation::Polygon(rings)),
            Wire::Flat(points) => Ok(Segmentation::polygon(points)),
            Wire::Rle(mask) => Ok(Segmentation::Rle(mask)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ring_list_and_flat_list() {
        let rings: Segmentation =
            serde_json::from_str("[[0,0,10,0,10,10],[20,20,30,20,30,30]]").expect("rings");
        assert!(matches!(&rings, Segmentation::Polygon(r) if r.len() == 2));

        let flat: Segmentation = serde_json::from_str("[0,0,10,0,10,10]").expect("flat");
        assert_eq!(flat, Segmentation::polygon(vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0]));
    }

    #[test]
    fn polygons_are_written_as_ring_lists() {
        let seg = Segmentation::polygon(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let json = serde_json::to_string(&seg).expect("serialize");
        assert_eq!(json, "[[1.0,2.0,3.0,4.0,5.0,6.0]]");
    }

    #[test]
    fn accepts_both_rle_count_forms() {
        let plain: Segmentation =
            serde_json::from_str(r#"{"size":[2,3],"counts":[1,4,1]}"#).expect("plain rle");
        match plain {
            Segmentation::Rle(mask) => {
                assert_eq!((mask.height(), mask.width()), (2, 3));
                assert_eq!(mask.uncompressed_total(), Some(6));
            }
            other => panic!("expected RLE, got {other:?}"),
        }

        let compressed: Segmentation =
            serde_json::from_str(r#"{"size":[4,4],"counts":"52203"}"#).expect("compressed rle");
        assert!(matches!(
            compressed,
            Segmentation::Rle(RleMask {
                counts: RleCounts::Compressed(_),
                ..
            })
        ));
    }

    #[test]
    fn accepts_legacy_rle_field_names() {
        let seg: Segmentation =
            serde_json::from_str(r#"{"rle_size":[1,2],"rle_counts":[0,2]}"#).expect("legacy rle");
        assert_eq!(seg.kind(), "rle");
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(serde_json::from_str::<Segmentation>(r#""mask""#).is_err());
        assert!(serde_json::from_str::<Segmentation>(r#"{"size":[1,2]}"#).is_err());
    }
}
