//! Writing annotation sets into PNG files.
//!
//! # Example
//!
//! ```no_run
//! use xlabel::embed::{embed, EmbedOptions};
//! use xlabel::ir::{Annotation, AnnotationSet, BBox};
//!
//! # fn demo(png: &[u8]) -> Result<(), xlabel::XlabelError> {
//! let set = AnnotationSet::new(vec!["cat".into()])
//!     .with_annotation(Annotation::new(0, BBox::from_xywh(10.0, 10.0, 40.0, 30.0)));
//! let tagged = embed(png, &set, &EmbedOptions::default())?;
//! # Ok(())
//! # }
//! ```

use crate::error::XlabelError;
use crate::ir::{io_json, AnnotationSet, ImageDims, DEFAULT_FORMAT_VERSION};
use crate::png::{self, XLABEL_CHUNK_TYPE};
use crate::validation::{validate_annotation_set, Severity};

/// Options for [`embed`].
#[derive(Clone, Debug)]
pub struct EmbedOptions {
    /// Always take width/height from the image. When false they are only
    /// filled in if zero.
    pub overwrite_dims: bool,

    /// Version written when the set's `format_version` is empty.
    pub format_version: String,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            overwrite_dims: true,
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
        }
    }
}

/// Embeds `set` into `png_bytes` and returns the new PNG stream.
///
/// The caller's set is not modified; dimension filling happens on a copy.
/// Pixel data and every other chunk are carried over byte for byte.
///
/// # Errors
///
/// - [`XlabelError::MalformedPng`] if the source is not a well-formed PNG
/// - [`XlabelError::Validation`] listing every violation if the set is invalid
pub fn embed(
    png_bytes: &[u8],
    set: &AnnotationSet,
    opts: &EmbedOptions,
) -> Result<Vec<u8>, XlabelError> {
    let chunks = png::parse(png_bytes)?;
    let dims = image_dimensions(png_bytes)?;

    let mut set = set.clone();
    if set.format_version.trim().is_empty() {
        set.format_version = opts.format_version.clone();
    }

    let props = &mut set.image_properties;
    if opts.overwrite_dims || props.dims().is_none() {
        if props.dims().is_some_and(|existing| existing != dims) {
            tracing::debug!(
                declared_width = props.width,
                declared_height = props.height,
                width = dims.width,
                height = dims.height,
                "replacing declared dimensions with actual image size"
            );
        }
        props.width = dims.width;
        props.height = dims.height;
    }

    let report = validate_annotation_set(&set);
    if !report.is_ok() {
        return Err(XlabelError::validation(report));
    }
    for issue in report
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Warning)
    {
        tracing::warn!(code = ?issue.code, context = %issue.context, "{}", issue.message);
    }

    let payload = io_json::to_json_vec(&set)?;
    tracing::debug!(
        annotations = set.annotations.len(),
        payload_bytes = payload.len(),
        "embedding annotation chunk"
    );

    let chunks = png::insert_or_replace_chunk(chunks, XLABEL_CHUNK_TYPE, payload)?;
    Ok(png::serialize(&chunks))
}

/// Reads the pixel dimensions of an encoded image.
pub fn image_dimensions(image_bytes: &[u8]) -> Result<ImageDims, XlabelError> {
    let size = imagesize::blob_size(image_bytes)
        .map_err(|source| XlabelError::ImageDimensionRead { source })?;

    let width = u32::try_from(size.width)
        .map_err(|_| XlabelError::malformed(format!("image width {} does not fit in u32", size.width)))?;
    let height = u32::try_from(size.height).map_err(|_| {
        XlabelError::malformed(format!("image height {} does not fit in u32", size.height))
    })?;

    Ok(ImageDims::new(width, height))
}
