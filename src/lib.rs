//! stagededupe - staged duplicate file detection
//!
//! Finds duplicates among a set of file records in three stages: identical
//! content hashes, perceptually similar images, and content similarity
//! proposed by an external oracle service. Every record ends up in at most
//! one group, and each group names the file to keep.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod oracle;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, FinderConfig, ScanResult};
use crate::error::ExitCode;
use crate::oracle::HttpSimilarityOracle;
use crate::output::{CsvOutput, JsonOutput, TextOutput};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::record::{build_records_with, RecordBuilder};
use crate::scanner::{FileRecord, Walker};

/// Run the application for parsed arguments.
///
/// # Errors
///
/// Returns an error for bad configuration, unreadable input, invalid scan
/// options, or an interrupted scan.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    let detection = cli.command.detection();
    detection.apply_to(&mut config);

    if let Commands::Scan(ref args) = cli.command {
        config.follow_symlinks |= args.follow_symlinks;
        config.skip_hidden |= args.skip_hidden;
    }

    let options = config.scan_options();
    options.validate()?;

    if let Some(ref path) = detection.save_config {
        config.save(path)?;
        log::info!("Saved configuration to {}", path.display());
    }

    let handler = signal::install_handler()?;
    let shutdown_flag = handler.get_flag();
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));

    let (records, skipped_files) = match cli.command {
        Commands::Scan(ref args) => {
            let mut walker_config = config.walker_config();
            walker_config.max_size = args.max_size;
            collect_records(
                &args.path,
                walker_config,
                &shutdown_flag,
                Arc::clone(&progress),
            )?
        }
        Commands::Analyze(ref args) => (load_records(&args.records)?, 0),
    };

    let mut finder_config = FinderConfig::default()
        .with_shutdown_flag(Arc::clone(&shutdown_flag))
        .with_progress_callback(progress);
    if let Some(ref root) = config.storage_root {
        finder_config = finder_config.with_storage_root(root.clone());
    }
    if config.oracle.enabled && options.enable_content_scanning {
        let oracle = HttpSimilarityOracle::new(&config.oracle.url, config.oracle.timeout())?;
        log::debug!("Similarity oracle at {}", oracle.endpoint());
        finder_config = finder_config.with_oracle(Arc::new(oracle));
    }

    let result = DuplicateFinder::new(finder_config).scan(records, options)?;

    write_report(&result, detection.output, detection.output_file.as_deref())?;

    Ok(if handler.is_shutdown_requested() {
        ExitCode::Interrupted
    } else if result.is_partial() || skipped_files > 0 {
        ExitCode::PartialSuccess
    } else if result.has_duplicates() {
        ExitCode::Success
    } else {
        ExitCode::NoDuplicates
    })
}

/// Walk `root` and build a record per file. Returns the records and the
/// number of files that could not be read.
fn collect_records(
    root: &Path,
    walker_config: scanner::WalkerConfig,
    shutdown_flag: &Arc<AtomicBool>,
    progress: Arc<dyn ProgressCallback>,
) -> Result<(Vec<FileRecord>, usize)> {
    let walker = Walker::new(root, walker_config).with_shutdown_flag(Arc::clone(shutdown_flag));
    walker.validate_root()?;

    let mut paths = Vec::new();
    let mut skipped = 0;
    for entry in walker.walk() {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => {
                log::warn!("{}", e);
                skipped += 1;
            }
        }
    }
    log::info!("Found {} files under {}", paths.len(), root.display());

    let builder = RecordBuilder::new().with_shutdown_flag(Arc::clone(shutdown_flag));
    let (records, errors) =
        build_records_with(&builder, &paths, Some(progress), Some(shutdown_flag.as_ref()));
    Ok((records, skipped + errors.len()))
}

/// Read a JSON array of records.
fn load_records(path: &Path) -> Result<Vec<FileRecord>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let records: Vec<FileRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse records from {}", path.display()))?;
    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

fn write_report(result: &ScanResult, format: OutputFormat, target: Option<&Path>) -> Result<()> {
    let mut writer: Box<dyn Write> = match target {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        OutputFormat::Json => JsonOutput::new(result).write_to(&mut writer, true)?,
        OutputFormat::Csv => CsvOutput::new(&result.groups).write_to(&mut writer)?,
        OutputFormat::Text => TextOutput::new(result).write_to(&mut writer)?,
    }
    writer.flush()?;
    Ok(())
}
