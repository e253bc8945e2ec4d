// src/main.rs
mod batch;
mod extractors;
mod sources;
mod storage;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use utils::AppError;
use batch::BatchRunner;
use extractors::{ExtractionMode, PostProcessor, ReportFieldExtractor};
use sources::SourceKind;
use storage::{FailureEntry, RunSummary, StorageManager};

/// Extracts demographic fields and report sections from radiology report PDFs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract one report and print the record as JSON
    Extract {
        /// Report file to read
        file: PathBuf,

        #[command(flatten)]
        options: ExtractOptions,
    },

    /// Extract every report under a directory into one JSON array
    Batch {
        /// Directory searched recursively for reports
        input_dir: PathBuf,

        #[command(flatten)]
        options: ExtractOptions,

        /// Output directory for extracted records
        #[arg(short, long, default_value = "./outputs")]
        output_dir: PathBuf,

        /// File name of the JSON array inside the output directory
        #[arg(long, default_value = "extracted_reports.json")]
        output_file: String,

        /// Number of documents processed concurrently
        #[arg(short, long, env = "REPORT_EXTRACT_JOBS", default_value_t = 4)]
        jobs: usize,

        /// Debug mode - save the raw text of every document
        #[arg(short, long)]
        debug: bool,
    },

    /// Normalize a previously extracted JSON array
    Clean {
        /// JSON array written by `batch`
        input: PathBuf,

        /// Output directory for cleaned records
        #[arg(short, long, default_value = "./outputs")]
        output_dir: PathBuf,

        /// File name of the cleaned JSON array
        #[arg(long, default_value = "cleaned_reports.json")]
        output_file: String,
    },
}

#[derive(ClapArgs, Debug)]
struct ExtractOptions {
    /// How section boundaries are located
    #[arg(short, long, value_enum, env = "REPORT_EXTRACT_MODE", default_value_t = ExtractionMode::LineState)]
    mode: ExtractionMode,

    /// Upstream text extractor
    #[arg(short, long, value_enum, default_value_t = SourceKind::Pdf)]
    source: SourceKind,

    /// Normalize records after extraction
    #[arg(long)]
    post_process: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    match args.command {
        Command::Extract { file, options } => run_extract(&file, &options),
        Command::Batch { input_dir, options, output_dir, output_file, jobs, debug } => {
            run_batch(&input_dir, &options, &output_dir, &output_file, jobs, debug).await
        }
        Command::Clean { input, output_dir, output_file } => run_clean(&input, &output_dir, &output_file),
    }
}

fn run_extract(file: &Path, options: &ExtractOptions) -> Result<(), AppError> {
    let source = options.source.build();
    if !source.accepts(file) {
        tracing::warn!("{} does not look like a {} file, reading anyway", file.display(), source.name());
    }

    let text = source.read_text(file)?;
    let extractor = ReportFieldExtractor::new(options.mode);
    let mut record = extractor.extract(&text, &file.to_string_lossy());
    if options.post_process {
        record = PostProcessor::new().process(&record);
    }

    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| AppError::Processing(format!("Failed to serialize record: {}", e)))?;
    println!("{}", json);
    Ok(())
}

async fn run_batch(
    input_dir: &Path,
    options: &ExtractOptions,
    output_dir: &Path,
    output_file: &str,
    jobs: usize,
    debug: bool,
) -> Result<(), AppError> {
    if jobs == 0 {
        return Err(AppError::Config("--jobs must be at least 1".to_string()));
    }

    // Fail on an unusable output path before doing any work.
    let storage = Arc::new(StorageManager::new(output_dir)?);
    tracing::info!("Writing outputs to {}", storage.base_dir().display());
    let source = options.source.build();
    let source_name = source.name();

    let mut runner = BatchRunner::new(Arc::from(source), ReportFieldExtractor::new(options.mode))
        .with_concurrency(jobs)
        .with_post_processing(options.post_process);
    if debug {
        runner = runner.with_debug_dumps(Arc::clone(&storage));
    }

    let outcome = runner.run(input_dir).await?;

    let path = storage.save_records(output_file, &outcome.records)?;
    tracing::info!("Successfully extracted {} reports into {}", outcome.records.len(), path.display());

    let summary = RunSummary {
        input_dir: input_dir.display().to_string(),
        mode: options.mode,
        source: source_name.to_string(),
        post_processed: options.post_process,
        records_written: outcome.records.len(),
        failures: outcome
            .failures
            .iter()
            .map(|f| FailureEntry {
                file_path: f.path.display().to_string(),
                error: f.error.to_string(),
            })
            .collect(),
    };
    storage.save_run_metadata(&meta_file_name(output_file), &summary)?;

    if outcome.records.is_empty() && !outcome.failures.is_empty() {
        return Err(AppError::Processing(format!(
            "Failed to extract any reports from {} documents",
            outcome.failures.len()
        )));
    }

    Ok(())
}

fn run_clean(input: &Path, output_dir: &Path, output_file: &str) -> Result<(), AppError> {
    let storage = StorageManager::new(output_dir)?;
    let records = storage.load_records(input)?;
    let cleaned = PostProcessor::new().process_all(&records);
    let path = storage.save_records(output_file, &cleaned)?;
    tracing::info!("Cleaned data saved to {}", path.display());
    Ok(())
}

/// `extracted_reports.json` -> `extracted_reports_meta.json`
fn meta_file_name(output_file: &str) -> String {
    let stem = output_file.strip_suffix(".json").unwrap_or(output_file);
    format!("{}_meta.json", stem)
}
