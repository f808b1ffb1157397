//! Canonical annotation model for xlabel.
//!
//! Every external format converts through these types. The model is one
//! [`AnnotationSet`] per image: an ordered class list, image properties and
//! a list of [`Annotation`]s whose `class_id` indexes into that class list.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: [`BBox`] is tagged with a coordinate space marker so
//!    pixel and YOLO-normalized boxes cannot be mixed up.
//!
//! 2. **Canonical Format**: boxes are always `[xmin, ymin, width, height]`
//!    in pixels, the same layout COCO uses.
//!
//! 3. **Permissive Construction**: invalid values (negative sizes, unknown
//!    class ids) can be represented so that validation can report them.
//!
//! # Example
//!
//! ```
//! use xlabel::ir::{Annotation, AnnotationSet, BBox, ImageProperties};
//!
//! let set = AnnotationSet::new(vec!["cat".into(), "dog".into()])
//!     .with_image_properties(ImageProperties::new("pets.png", 300, 300))
//!     .with_annotation(Annotation::new(0, BBox::from_xywh(50.0, 50.0, 100.0, 120.0)).with_score(0.95));
//! assert_eq!(set.class_name(0), Some("cat"));
//! ```

mod bbox;
pub mod io_coco_json;
pub mod io_json;
pub mod io_voc_xml;
pub mod io_yolo;
mod model;
mod segmentation;
mod space;

pub use bbox::BBox;
pub use model::{
    Annotation, AnnotationSet, CustomAttributes, ImageDims, ImageProperties,
    DEFAULT_FORMAT_VERSION,
};
pub use segmentation::{RleCounts, RleMask, Segmentation};
pub use space::{Normalized, Pixel};
