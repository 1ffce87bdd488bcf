//! Command-line interface definitions.
//!
//! ```bash
//! # Build records from a directory and find duplicates
//! stagededupe scan ./uploads
//!
//! # Records produced elsewhere, JSON report, no oracle
//! stagededupe analyze records.json --output json --no-content
//!
//! # Stricter threshold, custom oracle
//! stagededupe scan ./uploads -t 0.95 --oracle-url http://ml:8001
//!
//! # Keep these settings for next time
//! stagededupe scan ./uploads -t 0.95 --no-content --save-config ~/.config/stagededupe/config.toml
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;

/// Staged duplicate detection: exact hashes, perceptual hashes, then
/// content similarity through an external oracle.
#[derive(Debug, Parser)]
#[command(name = "stagededupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML); defaults to the platform config directory
    #[arg(long, value_name = "FILE", global = true, env = "STAGEDEDUPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build records from the files under a directory and scan them
    Scan(ScanArgs),
    /// Scan records read from a JSON file (an array of file records)
    Analyze(AnalyzeArgs),
}

impl Commands {
    /// Detection options shared by both subcommands.
    #[must_use]
    pub fn detection(&self) -> &DetectionArgs {
        match self {
            Self::Scan(args) => &args.detection,
            Self::Analyze(args) => &args.detection,
        }
    }
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Ignore files larger than this (e.g. 500MB, 1GiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    #[command(flatten)]
    pub detection: DetectionArgs,
}

/// Arguments for the analyze subcommand.
#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// JSON file holding an array of file records
    #[arg(value_name = "RECORDS")]
    pub records: PathBuf,

    #[command(flatten)]
    pub detection: DetectionArgs,
}

/// Stage switches, oracle settings and output options.
#[derive(Debug, Args)]
pub struct DetectionArgs {
    /// Similarity threshold for the perceptual and content stages (0.5 to 1.0)
    #[arg(short = 't', long, value_name = "THRESHOLD")]
    pub threshold: Option<f64>,

    /// Skip the exact-hash stage
    #[arg(long)]
    pub no_exact: bool,

    /// Skip the perceptual-hash stage
    #[arg(long)]
    pub no_perceptual: bool,

    /// Skip the content-similarity stage. The oracle is contacted by default;
    /// without a running similarity service the scan reports it unavailable
    /// and exits with code 3
    #[arg(long)]
    pub no_content: bool,

    /// Base URL of the similarity oracle
    #[arg(long, value_name = "URL")]
    pub oracle_url: Option<String>,

    /// Oracle request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub oracle_timeout: Option<u64>,

    /// Directory record names are resolved against for the oracle
    #[arg(long, value_name = "DIR")]
    pub storage_root: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Save the effective configuration (file, environment and flags) as TOML
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,
}

impl DetectionArgs {
    /// Apply flags on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(threshold) = self.threshold {
            config.similarity_threshold = threshold;
        }
        if self.no_exact {
            config.enable_hash_scanning = false;
        }
        if self.no_perceptual {
            config.enable_metadata_scanning = false;
        }
        if self.no_content {
            config.enable_content_scanning = false;
        }
        if let Some(ref url) = self.oracle_url {
            config.oracle.url.clone_from(url);
        }
        if let Some(secs) = self.oracle_timeout {
            config.oracle.timeout_secs = secs;
        }
        if let Some(ref root) = self.storage_root {
            config.storage_root = Some(root.clone());
        }
    }
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Readable report
    Text,
    /// JSON document
    Json,
    /// CSV rows
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Parse a human-readable size (`1024`, `10MB`, `1.5 GiB`) into bytes.
///
/// ```
/// use stagededupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
///
/// # Errors
///
/// Returns a message for empty or unparseable input.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    s.parse::<bytesize::ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("Invalid size '{s}': {e}"))
}
