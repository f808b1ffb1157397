//! Coordinate space markers for [`BBox`](super::BBox).
//!
//! Uninhabited enums used only as type parameters, so that a pixel-space box
//! cannot be written where a YOLO-normalized one is expected.

use std::fmt;

/// Absolute pixel coordinates, origin at the top-left corner.
///
/// This is the space of the canonical `bbox` field and of COCO/VOC boxes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Coordinates divided by the image width/height, as used by YOLO labels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalized {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Normalized {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
