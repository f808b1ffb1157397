//! Axis-aligned bounding boxes in `[x, y, width, height]` form.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::{Normalized, Pixel};

/// An axis-aligned bounding box stored as top-left corner plus size.
///
/// The canonical model uses `BBox<Pixel>`; YOLO conversion goes through
/// `BBox<Normalized>`.
///
/// Construction never rejects values. Negative sizes or NaN coordinates can
/// be represented so that validation can report them with context instead of
/// failing deep inside a parser.
pub struct BBox<TSpace> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    space: PhantomData<fn() -> TSpace>,
}

impl<TSpace> BBox<TSpace> {
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    /// Builds a box from corner coordinates (Pascal VOC style).
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::from_xywh(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    /// Builds a box from its center and size (YOLO style).
    #[inline]
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::from_xywh(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn to_xywh(&self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }

    #[inline]
    pub fn to_xyxy(&self) -> [f64; 4] {
        [self.xmin(), self.ymin(), self.xmax(), self.ymax()]
    }

    #[inline]
    pub fn to_cxcywh(&self) -> [f64; 4] {
        [
            self.x + self.width / 2.0,
            self.y + self.height / 2.0,
            self.width,
            self.height,
        ]
    }

    /// May be negative if the box is malformed.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Returns true if no component is NaN or infinite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.to_xywh().iter().all(|v| v.is_finite())
    }

    /// Returns true if any component is below zero.
    #[inline]
    pub fn has_negative(&self) -> bool {
        self.to_xywh().iter().any(|v| *v < 0.0)
    }

    /// Returns true if the box lies within `[0, max_x] x [0, max_y]`.
    pub fn fits_within(&self, max_x: f64, max_y: f64) -> bool {
        self.xmin() >= 0.0 && self.ymin() >= 0.0 && self.xmax() <= max_x && self.ymax() <= max_y
    }
}

impl BBox<Pixel> {
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBox<Normalized> {
        BBox::from_xywh(
            self.x / image_width,
            self.y / image_height,
            self.width / image_width,
            self.height / image_height,
        )
    }
}

impl BBox<Normalized> {
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBox<Pixel> {
        BBox::from_xywh(
            self.x * image_width,
            self.y * image_height,
            self.width * image_width,
            self.height * image_height,
        )
    }

    /// Clamps center and size into `[0, 1]`. Returns the clamped box and
    /// whether any component changed.
    pub fn clamp_unit(&self) -> (BBox<Normalized>, bool) {
        let [cx, cy, w, h] = self.to_cxcywh();
        let clamped = [cx, cy, w, h].map(|v| v.clamp(0.0, 1.0));
        let changed = clamped != [cx, cy, w, h];
        let [cx, cy, w, h] = clamped;
        (BBox::from_cxcywh(cx, cy, w, h), changed)
    }
}

// Manual impls: derives would put bounds on the marker type.
impl<TSpace> Clone for BBox<TSpace> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<TSpace> Copy for BBox<TSpace> {}

impl<TSpace> PartialEq for BBox<TSpace> {
    fn eq(&self, other: &Self) -> bool {
        self.to_xywh() == other.to_xywh()
    }
}

impl<TSpace> Default for BBox<TSpace> {
    fn default() -> Self {
        Self::from_xywh(0.0, 0.0, 0.0, 0.0)
    }
}

impl<TSpace> std::fmt::Debug for BBox<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBox")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl<TSpace> Serialize for BBox<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_xywh().serialize(serializer)
    }
}

impl<'de, TSpace> Deserialize<'de> for BBox<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x, y, width, height] = <[f64; 4]>::deserialize(deserializer)?;
        Ok(BBox::from_xywh(x, y, width, height))
    }
}
