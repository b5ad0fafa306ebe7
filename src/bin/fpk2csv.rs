use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fpk_to_csv::{
    CleanOptions, CleanedRecord, DEFAULT_PREVIEW_ROWS, ExtractOptions, Extraction,
    ExtractionReport, PageSelection, PdfSource, Period, ReadOptions, TableDetection,
    ZeroAmountPolicy, detect_period_in_pdf, extract_with_report, preview_table, read_csv,
    write_csv,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MIB: u64 = 1024 * 1024;
const DEFAULT_MAX_SIZE_MIB: u64 = 16;

#[derive(Debug, Parser)]
#[command(
    name = "fpk2csv",
    version,
    about = "Convert FPK claim reports (PDF) into a No.SEP,Disetujui CSV"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract claims from an FPK PDF and write the CSV.
    Convert(ConvertArgs),
    /// Show the first records of an FPK PDF or of a converted CSV.
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DetectionArg {
    /// Cells delimited by ruling lines.
    Lattice,
    /// Cells inferred from text alignment.
    Stream,
}

impl From<DetectionArg> for TableDetection {
    fn from(value: DetectionArg) -> Self {
        match value {
            DetectionArg::Lattice => Self::Lattice,
            DetectionArg::Stream => Self::Stream,
        }
    }
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV path. Defaults to FPK_<Month>_<Year>.csv next to the input.
    #[arg(short, long, conflicts_with = "out_dir")]
    output: Option<PathBuf>,

    /// Directory for the generated CSV name.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// How table cells are found on the page.
    #[arg(long, value_enum, default_value_t = DetectionArg::Lattice)]
    detection: DetectionArg,

    /// Keep records whose approved amount is zero.
    #[arg(long)]
    keep_zero: bool,

    /// Largest accepted input size in MiB.
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE_MIB)]
    max_size_mib: u64,

    /// Print the extraction report as JSON instead of the preview.
    #[arg(long)]
    report_json: bool,

    /// Log pipeline progress and list every warning.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct PreviewArgs {
    /// FPK PDF or converted CSV.
    #[arg(short, long)]
    input: PathBuf,

    /// Number of records to show.
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
    limit: usize,

    /// Log pipeline progress.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConvertSummary<'a> {
    output: String,
    period: Option<String>,
    report: &'a ExtractionReport,
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn validate_input(path: &Path, max_size_mib: u64) -> Result<()> {
    if !has_extension(path, "pdf") {
        bail!("'{}' is not a PDF file", path.display());
    }
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    if metadata.len() > max_size_mib.saturating_mul(MIB) {
        bail!(
            "'{}' is larger than the {max_size_mib} MiB limit",
            path.display()
        );
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ASCII letters, digits, `-` and `_` survive; anything else becomes `_`.
fn sanitize_stem(stem: &str) -> String {
    let sanitized = stem
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    if sanitized.is_empty() {
        "output".to_string()
    } else {
        sanitized
    }
}

fn default_file_name(input: &Path, period: Option<Period>) -> String {
    match period {
        Some(period) => format!("{}.csv", period.file_stem()),
        None => {
            let stem = input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("FPK_{}.csv", sanitize_stem(&stem))
        }
    }
}

fn resolve_output(args: &ConvertArgs, period: Option<Period>) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }
    let dir = args.out_dir.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    });
    dir.join(default_file_name(&args.input, period))
}

fn parse_options(args: &ConvertArgs) -> Result<ExtractOptions> {
    let pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .map_err(|error| anyhow!("invalid page selection: {error}"))
        .context("failed to parse --pages")?;

    Ok(ExtractOptions {
        read: ReadOptions {
            pages,
            detection: args.detection.into(),
            ..ReadOptions::default()
        },
        clean: CleanOptions {
            zero_amount: if args.keep_zero {
                ZeroAmountPolicy::Keep
            } else {
                ZeroAmountPolicy::Drop
            },
        },
    })
}

fn detect_period(input: &Path) -> Option<Period> {
    match detect_period_in_pdf(PdfSource::Path(input)) {
        Ok(period) => period,
        Err(error) => {
            warn!(%error, "could not read reporting period");
            None
        }
    }
}

fn log_report(report: &ExtractionReport, verbose: bool) {
    if report.warnings.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) detected", report.warnings.len());
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "  - {:?} page={:?}: {}",
                warning.code, warning.page, warning.message
            );
        }
    }
}

fn print_preview(records: &[CleanedRecord], limit: usize) {
    println!("{} record(s)", records.len());
    if !records.is_empty() {
        println!("{}", preview_table(records, limit));
    }
}

fn run_convert(args: &ConvertArgs) -> Result<usize> {
    validate_input(&args.input, args.max_size_mib)?;
    if args
        .output
        .as_deref()
        .is_some_and(|output| same_file(output, &args.input))
    {
        bail!("'{}' would overwrite the input PDF", args.input.display());
    }
    let options = parse_options(args)?;

    let Extraction { records, report } = extract_with_report(&args.input, &options)
        .with_context(|| format!("failed to extract claims from '{}'", args.input.display()))?;

    let period = detect_period(&args.input);
    let output = resolve_output(args, period);
    if let Err(error) = write_csv(&output, &records) {
        // A failed write may leave a truncated file behind.
        let _ = fs::remove_file(&output);
        return Err(error).with_context(|| format!("failed to write '{}'", output.display()));
    }
    info!(records = records.len(), output = %output.display(), "CSV written");

    log_report(&report, args.verbose);
    if args.report_json {
        let summary = ConvertSummary {
            output: output.display().to_string(),
            period: period.map(|period| period.to_string()),
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Converted {} record(s) to {}",
            records.len(),
            output.display()
        );
        if let Some(period) = period {
            println!("Period: {period}");
        }
        print_preview(&records, DEFAULT_PREVIEW_ROWS);
    }
    Ok(records.len())
}

fn run_preview(args: &PreviewArgs) -> Result<usize> {
    let records = if has_extension(&args.input, "csv") {
        let file = fs::File::open(&args.input)
            .with_context(|| format!("failed to open '{}'", args.input.display()))?;
        read_csv(file).with_context(|| format!("failed to read '{}'", args.input.display()))?
    } else {
        validate_input(&args.input, DEFAULT_MAX_SIZE_MIB)?;
        extract_with_report(&args.input, &ExtractOptions::default())
            .with_context(|| {
                format!("failed to extract claims from '{}'", args.input.display())
            })?
            .records
    };

    print_preview(&records, args.limit);
    Ok(records.len())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "fpk_to_csv=info,fpk2csv=info"
    } else {
        "fpk_to_csv=warn,fpk2csv=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn exit_code(result: Result<usize>) -> ExitCode {
    match result {
        Ok(0) => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Convert(args) => {
            init_logging(args.verbose);
            exit_code(run_convert(&args))
        }
        Commands::Preview(args) => {
            init_logging(args.verbose);
            exit_code(run_preview(&args))
        }
    }
}
