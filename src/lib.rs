//! XLabel: object annotations that travel inside the image.
//!
//! XLabel stores an annotation set (class names, bounding boxes, optional
//! scores, segmentation and free-form attributes) in a private ancillary PNG
//! chunk, and converts it to and from COCO, Pascal VOC and YOLO.
//!
//! # Modules
//!
//! - [`png`]: chunk-level PNG codec
//! - [`ir`]: canonical annotation model and the per-format converters
//! - [`embed`] / [`read`]: writing and reading the annotation chunk
//! - [`conversion`]: format dispatch and lossiness reporting
//! - [`validation`]: annotation set validation
//! - [`batch`]: directory drivers
//! - [`error`]: error types for xlabel operations

pub mod batch;
pub mod conversion;
pub mod embed;
pub mod error;
pub mod ir;
pub mod png;
pub mod read;
pub mod validation;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use error::XlabelError;

use batch::{BatchOptions, BatchReport};
use conversion::{ConvertOptions, Format};
use embed::EmbedOptions;
use ir::{io_json, io_yolo, DEFAULT_FORMAT_VERSION};
use read::ReadOptions;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "XLABEL_LOG";

/// The xlabel CLI application.
#[derive(Parser)]
#[command(name = "xlabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Embed sidecar JSON annotations into PNG images.
    Create(CreateArgs),
    /// Extract embedded annotations as JSON.
    Read(ReadArgs),
    /// Validate embedded annotations or a sidecar JSON file.
    Validate(ValidateArgs),
    /// Export embedded annotations to COCO, VOC or YOLO.
    Export(ExportArgs),
    /// Build XLabel PNGs from COCO, VOC or YOLO annotations.
    Import(ImportArgs),
}

/// External formats accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Coco,
    #[value(alias = "pascal-voc")]
    Voc,
    Yolo,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Coco => Format::Coco,
            FormatArg::Voc => Format::Voc,
            FormatArg::Yolo => Format::Yolo,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum ReportOutput {
    #[default]
    Text,
    Json,
}

/// Arguments for the create subcommand.
#[derive(clap::Args)]
struct CreateArgs {
    /// PNG image, or a directory of PNG images.
    input: PathBuf,

    /// Sidecar JSON file, or a directory of `<stem>.json` files.
    annotations: PathBuf,

    /// Output PNG file, or output directory.
    output: PathBuf,

    /// Keep width/height from the sidecar when they are already set.
    #[arg(long)]
    keep_dims: bool,

    /// Format version written when the sidecar does not set one.
    #[arg(long, env = "XLABEL_FORMAT_VERSION", default_value = DEFAULT_FORMAT_VERSION)]
    format_version: String,

    /// Replace output files that already exist.
    #[arg(long)]
    overwrite: bool,
}

/// Arguments for the read subcommand.
#[derive(clap::Args)]
struct ReadArgs {
    /// XLabel PNG, or a directory of them.
    input: PathBuf,

    /// Output JSON file (printed to stdout when omitted), or output
    /// directory when the input is a directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Drop invalid annotations instead of failing.
    #[arg(long)]
    lenient: bool,

    /// Replace output files that already exist.
    #[arg(long)]
    overwrite: bool,
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// XLabel PNG or sidecar JSON file.
    input: PathBuf,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long, env = "XLABEL_STRICT")]
    strict: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = ReportOutput::Text)]
    output: ReportOutput,
}

/// Arguments for the export subcommand.
#[derive(clap::Args)]
struct ExportArgs {
    /// XLabel PNG, or a directory of them.
    input: PathBuf,

    /// Target format.
    #[arg(long, value_enum)]
    to: FormatArg,

    /// Output file, or output directory when the input is a directory.
    #[arg(short, long)]
    output: PathBuf,

    /// YOLO class list path for single-file export (defaults to
    /// `classes.txt` next to the output).
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Drop segmentation instead of failing when the target cannot store it.
    #[arg(long)]
    allow_lossy: bool,

    /// Drop invalid annotations instead of failing.
    #[arg(long)]
    lenient: bool,

    /// Print the conversion report.
    #[arg(long, value_enum)]
    report: Option<ReportOutput>,

    /// Replace output files that already exist.
    #[arg(long)]
    overwrite: bool,
}

/// Arguments for the import subcommand.
#[derive(clap::Args)]
struct ImportArgs {
    /// Source format.
    #[arg(long, value_enum)]
    from: FormatArg,

    /// PNG image, or a directory of PNG images.
    input: PathBuf,

    /// Annotation file (COCO JSON, VOC XML, YOLO TXT). For a directory
    /// input: the COCO JSON file, or the directory of VOC/YOLO files.
    #[arg(long)]
    annotations: PathBuf,

    /// Output PNG file, or output directory.
    #[arg(short, long)]
    output: PathBuf,

    /// Class list (`classes.txt` or `data.yaml`) fixing class order.
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Format version stamped on the imported annotations.
    #[arg(long, env = "XLABEL_FORMAT_VERSION", default_value = DEFAULT_FORMAT_VERSION)]
    format_version: String,

    /// Replace output files that already exist.
    #[arg(long)]
    overwrite: bool,
}

/// Run the xlabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), XlabelError> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Create(args)) => run_create(args),
        Some(Commands::Read(args)) => run_read(args),
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Export(args)) => run_export(args),
        Some(Commands::Import(args)) => run_import(args),
        None => {
            println!("xlabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Annotations embedded in PNG files.");
            println!();
            println!("Run 'xlabel --help' for usage information.");
            Ok(())
        }
    }
}

/// Installs a stderr subscriber filtered by `XLABEL_LOG`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("xlabel=info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn run_create(args: CreateArgs) -> Result<(), XlabelError> {
    let embed_opts = EmbedOptions {
        overwrite_dims: !args.keep_dims,
        format_version: args.format_version,
    };

    if args.input.is_dir() {
        let opts = BatchOptions {
            overwrite: args.overwrite,
            embed: embed_opts,
            ..Default::default()
        };
        let report = batch::embed_dir(&args.input, &args.annotations, &args.output, &opts)?;
        return finish_batch(report);
    }

    let mut set = io_json::read_sidecar_json(&args.annotations)?;
    if set.image_properties.filename.is_empty() {
        set.image_properties.filename = display_name(&args.input);
    }
    let tagged = embed::embed(&fs::read(&args.input)?, &set, &embed_opts)?;
    batch::write_output(&args.output, &tagged, args.overwrite)?;

    println!(
        "Embedded {} annotation(s) into {}",
        set.annotations.len(),
        args.output.display()
    );
    Ok(())
}

fn run_read(args: ReadArgs) -> Result<(), XlabelError> {
    let read_opts = ReadOptions {
        strict: !args.lenient,
    };

    if args.input.is_dir() {
        let out_dir = args.output.ok_or_else(|| {
            XlabelError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "--output is required when reading a directory",
            ))
        })?;
        let opts = BatchOptions {
            overwrite: args.overwrite,
            read: read_opts,
            ..Default::default()
        };
        let report = batch::extract_dir(&args.input, &out_dir, &opts)?;
        return finish_batch(report);
    }

    let set = read::read(&fs::read(&args.input)?, &read_opts)?;
    let json = io_json::to_json_string_pretty(&set)?;
    match args.output {
        Some(path) => batch::write_output(&path, json.as_bytes(), args.overwrite)?,
        None => println!("{}", json),
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), XlabelError> {
    let opts = validation::ValidateOptions {
        strict: args.strict,
    };

    let is_json = args
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let report = if is_json {
        let set = io_json::read_sidecar_json(&args.input)?;
        validation::validate_annotation_set(&set)
    } else {
        let lenient = ReadOptions { strict: false };
        read::read_with_report(&fs::read(&args.input)?, &lenient)?.report
    };

    match args.output {
        ReportOutput::Json => {
            let issues: Vec<serde_json::Value> = report
                .issues
                .iter()
                .map(|issue| {
                    serde_json::json!({
                        "severity": format!("{:?}", issue.severity),
                        "code": format!("{:?}", issue.code),
                        "message": issue.message,
                        "context": issue.context.to_string(),
                    })
                })
                .collect();
            let doc = serde_json::json!({
                "error_count": report.error_count(),
                "warning_count": report.warning_count(),
                "issues": issues,
            });
            let text = serde_json::to_string_pretty(&doc).map_err(XlabelError::Serialize)?;
            println!("{}", text);
        }
        ReportOutput::Text => print!("{}", report),
    }

    if opts.passes(&report) {
        Ok(())
    } else {
        Err(XlabelError::validation(report))
    }
}

fn run_export(args: ExportArgs) -> Result<(), XlabelError> {
    let format = Format::from(args.to);
    let read_opts = ReadOptions {
        strict: !args.lenient,
    };
    let convert_opts = ConvertOptions::default().allow_lossy(args.allow_lossy);

    if args.input.is_dir() {
        let opts = BatchOptions {
            overwrite: args.overwrite,
            read: read_opts,
            convert: convert_opts,
            ..Default::default()
        };
        let report = batch::export_dir(&args.input, format, &args.output, &opts)?;
        return finish_batch(report);
    }

    let set = read::read(&fs::read(&args.input)?, &read_opts)?;
    let (bytes, report) =
        conversion::convert_from_canonical_with_report(format, &set, &convert_opts)?;
    batch::write_output(&args.output, &bytes, args.overwrite)?;

    if format == Format::Yolo {
        let classes = args
            .classes
            .unwrap_or_else(|| args.output.with_file_name(batch::YOLO_CLASSES_NAME));
        batch::write_output(
            &classes,
            io_yolo::to_classes_txt(&set.class_names).as_bytes(),
            args.overwrite,
        )?;
    }

    match args.report {
        Some(ReportOutput::Json) => {
            let text = serde_json::to_string_pretty(&report).map_err(XlabelError::Serialize)?;
            println!("{}", text);
        }
        Some(ReportOutput::Text) => {
            println!(
                "Converted {} to {} ({})",
                args.input.display(),
                args.output.display(),
                format
            );
            print!("{}", report);
        }
        None => {}
    }
    Ok(())
}

fn run_import(args: ImportArgs) -> Result<(), XlabelError> {
    let format = Format::from(args.from);
    let mut convert_opts = ConvertOptions {
        format_version: args.format_version,
        ..Default::default()
    };
    if let Some(path) = &args.classes {
        convert_opts.class_names = Some(io_yolo::read_class_list_file(path)?);
    }

    if args.input.is_dir() {
        let opts = BatchOptions {
            overwrite: args.overwrite,
            convert: convert_opts,
            ..Default::default()
        };
        let report =
            batch::import_dir(format, &args.input, &args.annotations, &args.output, &opts)?;
        return finish_batch(report);
    }

    let png_bytes = fs::read(&args.input)?;
    let dims = embed::image_dimensions(&png_bytes)?;
    let filename = display_name(&args.input);
    let item_opts = ConvertOptions {
        image_dims: Some(dims),
        image_filename: Some(filename.clone()),
        ..convert_opts
    };

    let mut set =
        conversion::convert_to_canonical(format, &fs::read(&args.annotations)?, &item_opts)?;
    set.image_properties.filename = filename;
    let tagged = embed::embed(&png_bytes, &set, &EmbedOptions::default())?;
    batch::write_output(&args.output, &tagged, args.overwrite)?;

    println!(
        "Imported {} annotation(s) from {} into {}",
        set.annotations.len(),
        format,
        args.output.display()
    );
    Ok(())
}

fn finish_batch(report: BatchReport) -> Result<(), XlabelError> {
    print!("{}", report);
    if report.is_success() {
        Ok(())
    } else {
        Err(XlabelError::BatchFailed {
            failed: report.failed.len(),
            total: report.total(),
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
