//! Directory-level drivers.
//!
//! Each driver processes files independently: one bad file is recorded in
//! the returned [`BatchReport`] and the rest of the directory still runs.
//! Only setup failures (unreadable input directory, unparsable COCO file)
//! abort the whole call. Outputs are written to a temporary file in the
//! destination directory and renamed into place.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::conversion::{self, ConvertOptions, Format};
use crate::embed::{self, EmbedOptions};
use crate::error::XlabelError;
use crate::ir::io_coco_json::{self, CocoAggregator, CocoDataset};
use crate::ir::{io_json, io_yolo, AnnotationSet};
use crate::read::{self, ReadOptions};

/// Name of the aggregated COCO file written by [`export_dir`].
pub const COCO_OUTPUT_NAME: &str = "annotations.json";

/// Name of the YOLO class list written by [`export_dir`].
pub const YOLO_CLASSES_NAME: &str = "classes.txt";

/// Options shared by every driver.
#[derive(Clone, Debug, Default)]
pub struct BatchOptions {
    /// Replace output files that already exist.
    pub overwrite: bool,
    pub embed: EmbedOptions,
    pub read: ReadOptions,
    pub convert: ConvertOptions,
}

/// Outcome of a directory run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Input files that produced output.
    pub succeeded: Vec<PathBuf>,
    /// Input files that failed, with the reason.
    pub failed: Vec<(PathBuf, XlabelError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    fn record(&mut self, path: &Path, result: Result<(), XlabelError>) {
        match result {
            Ok(()) => self.succeeded.push(path.to_path_buf()),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping file");
                self.failed.push((path.to_path_buf(), error));
            }
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} file(s): {} succeeded, {} failed",
            self.total(),
            self.succeeded.len(),
            self.failed.len()
        )?;
        for (path, error) in &self.failed {
            writeln!(f, "  - {}: {}", path.display(), error)?;
        }
        Ok(())
    }
}

/// Embeds `<sidecar_dir>/<stem>.json` into every PNG in `images_dir`,
/// writing `<out_dir>/<stem>.png`.
pub fn embed_dir(
    images_dir: &Path,
    sidecar_dir: &Path,
    out_dir: &Path,
    opts: &BatchOptions,
) -> Result<BatchReport, XlabelError> {
    let images = collect_files(images_dir, &["png"])?;
    fs::create_dir_all(out_dir)?;

    let mut report = BatchReport::default();
    for image in images {
        let result = (|| -> Result<(), XlabelError> {
            let stem = file_stem(&image)?;
            let sidecar = sidecar_dir.join(format!("{stem}.json"));
            if !sidecar.is_file() {
                return Err(XlabelError::MissingCompanion {
                    kind: "sidecar JSON",
                    path: sidecar,
                });
            }
            let mut set = io_json::read_sidecar_json(&sidecar)?;
            if set.image_properties.filename.is_empty() {
                set.image_properties.filename = file_name(&image);
            }

            let png_bytes = fs::read(&image)?;
            let tagged = embed::embed(&png_bytes, &set, &opts.embed)?;
            write_output(&out_dir.join(format!("{stem}.png")), &tagged, opts.overwrite)
        })();
        report.record(&image, result);
    }

    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "embedded directory"
    );
    Ok(report)
}

/// Writes the embedded set of every PNG in `png_dir` to
/// `<out_dir>/<stem>.json`.
pub fn extract_dir(
    png_dir: &Path,
    out_dir: &Path,
    opts: &BatchOptions,
) -> Result<BatchReport, XlabelError> {
    let pngs = collect_files(png_dir, &["png"])?;
    fs::create_dir_all(out_dir)?;

    let mut report = BatchReport::default();
    for png in pngs {
        let result = (|| -> Result<(), XlabelError> {
            let stem = file_stem(&png)?;
            let set = read::read(&fs::read(&png)?, &opts.read)?;
            let json = io_json::to_json_string_pretty(&set)?;
            write_output(
                &out_dir.join(format!("{stem}.json")),
                json.as_bytes(),
                opts.overwrite,
            )
        })();
        report.record(&png, result);
    }

    Ok(report)
}

/// Exports every XLabel PNG in `png_dir` as `format`.
///
/// COCO produces one aggregated [`COCO_OUTPUT_NAME`] with globally unique
/// ids. VOC and YOLO produce one file per image; YOLO also writes a shared
/// [`YOLO_CLASSES_NAME`], remapping each image's class ids onto it.
pub fn export_dir(
    png_dir: &Path,
    format: Format,
    out_dir: &Path,
    opts: &BatchOptions,
) -> Result<BatchReport, XlabelError> {
    let pngs = collect_files(png_dir, &["png"])?;
    fs::create_dir_all(out_dir)?;

    let mut report = BatchReport::default();
    let mut aggregator = CocoAggregator::new();
    let mut yolo_classes: Vec<String> = Vec::new();

    for png in pngs {
        let result = (|| -> Result<(), XlabelError> {
            let set = read::read(&fs::read(&png)?, &opts.read)?;
            match format {
                Format::Coco => {
                    aggregator.add(&set, opts.convert.image_dims)?;
                    Ok(())
                }
                Format::Voc => {
                    let stem = file_stem(&png)?;
                    let xml = conversion::convert_from_canonical(format, &set, &opts.convert)?;
                    write_output(
                        &out_dir.join(format!("{stem}.{}", format.extension())),
                        &xml,
                        opts.overwrite,
                    )
                }
                Format::Yolo => {
                    let stem = file_stem(&png)?;
                    let mut candidate = yolo_classes.clone();
                    let remapped = remap_classes(&set, &mut candidate)?;
                    let text =
                        conversion::convert_from_canonical(format, &remapped, &opts.convert)?;
                    write_output(
                        &out_dir.join(format!("{stem}.{}", format.extension())),
                        &text,
                        opts.overwrite,
                    )?;
                    yolo_classes = candidate;
                    Ok(())
                }
            }
        })();
        report.record(&png, result);
    }

    match format {
        Format::Coco if aggregator.image_count() > 0 => {
            let json = aggregator.to_json_string()?;
            write_output(&out_dir.join(COCO_OUTPUT_NAME), json.as_bytes(), opts.overwrite)?;
        }
        Format::Yolo if !report.succeeded.is_empty() => {
            let classes = io_yolo::to_classes_txt(&yolo_classes);
            write_output(
                &out_dir.join(YOLO_CLASSES_NAME),
                classes.as_bytes(),
                opts.overwrite,
            )?;
        }
        _ => {}
    }

    Ok(report)
}

/// Builds XLabel PNGs from external annotations.
///
/// `annotations` is the COCO JSON file for [`Format::Coco`], or the
/// directory holding `<stem>.xml` / `<stem>.txt` files for VOC and YOLO.
/// For YOLO without explicit class names, a `classes.txt` or `data.yaml`
/// in that directory is used when present.
pub fn import_dir(
    format: Format,
    images_dir: &Path,
    annotations: &Path,
    out_dir: &Path,
    opts: &BatchOptions,
) -> Result<BatchReport, XlabelError> {
    let images = collect_files(images_dir, &["png"])?;
    fs::create_dir_all(out_dir)?;

    let coco = match format {
        Format::Coco => Some(io_coco_json::parse_coco_slice(&fs::read(annotations)?)?),
        _ => None,
    };

    let mut convert = opts.convert.clone();
    if format == Format::Yolo && convert.class_names.is_none() {
        convert.class_names = find_yolo_class_list(annotations)?;
    }

    let mut report = BatchReport::default();
    for image in images {
        let result = (|| -> Result<(), XlabelError> {
            let stem = file_stem(&image)?;
            let filename = file_name(&image);
            let png_bytes = fs::read(&image)?;

            let set = match &coco {
                Some(coco) => import_coco_image(coco, &filename, &convert)?,
                None => {
                    let companion = annotations.join(format!("{stem}.{}", format.extension()));
                    if !companion.is_file() {
                        return Err(XlabelError::MissingCompanion {
                            kind: format.name(),
                            path: companion,
                        });
                    }
                    let dims = embed::image_dimensions(&png_bytes)?;
                    let item_opts = ConvertOptions {
                        image_dims: Some(dims),
                        image_filename: Some(filename.clone()),
                        ..convert.clone()
                    };
                    conversion::convert_to_canonical(format, &fs::read(&companion)?, &item_opts)?
                }
            };

            let mut set = set;
            set.image_properties.filename = filename;
            let tagged = embed::embed(&png_bytes, &set, &opts.embed)?;
            write_output(&out_dir.join(format!("{stem}.png")), &tagged, opts.overwrite)
        })();
        report.record(&image, result);
    }

    Ok(report)
}

fn import_coco_image(
    coco: &CocoDataset,
    filename: &str,
    opts: &ConvertOptions,
) -> Result<AnnotationSet, XlabelError> {
    let seed = opts.class_names.as_deref().unwrap_or(&[]);
    let mut set = io_coco_json::coco_to_annotation_set(coco, Some(filename), seed)?;
    set.format_version = opts.format_version.clone();
    Ok(set)
}

/// Rewrites `set` so that its class ids index into `global`, appending
/// names `global` does not have yet.
fn remap_classes(set: &AnnotationSet, global: &mut Vec<String>) -> Result<AnnotationSet, XlabelError> {
    let mut remapped = set.clone();
    for (index, ann) in remapped.annotations.iter_mut().enumerate() {
        let name = set
            .class_name(ann.class_id)
            .ok_or_else(|| XlabelError::YoloClassList {
                message: format!(
                    "annotation {} has class_id {} outside class_names",
                    index, ann.class_id
                ),
            })?;
        ann.class_id = match global.iter().position(|known| known == name) {
            Some(pos) => pos as i64,
            None => {
                global.push(name.to_string());
                (global.len() - 1) as i64
            }
        };
    }
    for name in &set.class_names {
        if !global.contains(name) {
            global.push(name.clone());
        }
    }
    remapped.class_names = global.clone();
    Ok(remapped)
}

fn find_yolo_class_list(dir: &Path) -> Result<Option<Vec<String>>, XlabelError> {
    for name in [YOLO_CLASSES_NAME, "data.yaml", "data.yml"] {
        let candidate = dir.join(name);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "using YOLO class list");
            return io_yolo::read_class_list_file(&candidate).map(Some);
        }
    }
    Ok(None)
}

/// Lists files directly inside `root` with one of `extensions`, sorted by path.
fn collect_files(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, XlabelError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| XlabelError::DirectoryScan {
            path: root.to_path_buf(),
            message: source.to_string(),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

fn file_stem(path: &Path) -> Result<String, XlabelError> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| XlabelError::DirectoryScan {
            path: path.to_path_buf(),
            message: "file has no name".to_string(),
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Writes `bytes` to `path` through a temporary file in the same directory.
pub(crate) fn write_output(path: &Path, bytes: &[u8], overwrite: bool) -> Result<(), XlabelError> {
    if !overwrite && path.exists() {
        return Err(XlabelError::OutputExists {
            path: path.to_path_buf(),
        });
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| XlabelError::Io(err.error))?;
    Ok(())
}
