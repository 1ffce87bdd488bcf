//! Detection orchestrator.
//!
//! # Overview
//!
//! [`DuplicateFinder::scan`] runs the stages in a fixed order, each
//! independently toggled by [`ScanOptions`]:
//! 1. **Exact** - identical SHA-256 (see [`super::exact`])
//! 2. **Perceptual** - image hash clustering (see [`super::perceptual`])
//! 3. **Content** - oracle reconciliation (see [`super::content`])
//!
//! A record claimed by one stage is invisible to the later ones. The finder
//! owns the [`ClaimedSet`] and the [`GroupIndexer`] for exactly one scan, so
//! concurrent scans share nothing.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use stagededupe::duplicates::{DuplicateFinder, ScanOptions};
//! use stagededupe::scanner::FileRecord;
//!
//! let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let records = vec![
//!     FileRecord::new("a", "a.txt", 10, "text/plain", t, "m", "same"),
//!     FileRecord::new("b", "b.txt", 10, "text/plain", t, "m", "same"),
//! ];
//!
//! let result = DuplicateFinder::with_defaults()
//!     .scan(records, ScanOptions::default())
//!     .unwrap();
//!
//! assert_eq!(result.groups.len(), 1);
//! assert_eq!(result.duplicates_found, 1);
//! assert_eq!(result.size_saved, 10);
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::claims::ClaimedSet;
use super::content::{find_content_duplicates, ScanDiagnostic};
use super::exact::find_exact_duplicates;
use super::groups::{DuplicateGroup, GroupIndexer};
use super::perceptual::cluster_similar_images;
use crate::oracle::SimilarityOracle;
use crate::progress::ProgressCallback;
use crate::scanner::FileRecord;

/// Lowest accepted similarity threshold.
pub const MIN_SIMILARITY_THRESHOLD: f64 = 0.5;
/// Highest accepted similarity threshold.
pub const MAX_SIMILARITY_THRESHOLD: f64 = 1.0;
/// Similarity threshold used when none is given.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Per-scan switches and the similarity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Run the exact-match stage
    pub enable_hash_scanning: bool,
    /// Run the content stage
    pub enable_content_scanning: bool,
    /// Run the perceptual stage
    pub enable_metadata_scanning: bool,
    /// Inclusive bound for the perceptual and content stages, in [0.5, 1.0]
    pub similarity_threshold: f64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            enable_hash_scanning: true,
            enable_content_scanning: true,
            enable_metadata_scanning: true,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl ScanOptions {
    /// Enable or disable the exact-match stage.
    #[must_use]
    pub fn with_hash_scanning(mut self, enabled: bool) -> Self {
        self.enable_hash_scanning = enabled;
        self
    }

    /// Enable or disable the perceptual stage.
    #[must_use]
    pub fn with_metadata_scanning(mut self, enabled: bool) -> Self {
        self.enable_metadata_scanning = enabled;
        self
    }

    /// Enable or disable the content stage.
    #[must_use]
    pub fn with_content_scanning(mut self, enabled: bool) -> Self {
        self.enable_content_scanning = enabled;
        self
    }

    /// Set the similarity threshold. Checked by [`ScanOptions::validate`].
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Reject thresholds outside [0.5, 1.0] (NaN included).
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::InvalidThreshold`].
    pub fn validate(&self) -> Result<(), FinderError> {
        if (MIN_SIMILARITY_THRESHOLD..=MAX_SIMILARITY_THRESHOLD)
            .contains(&self.similarity_threshold)
        {
            Ok(())
        } else {
            Err(FinderError::InvalidThreshold(self.similarity_threshold))
        }
    }
}

/// Configuration for the duplicate finder.
#[derive(Clone, Default)]
pub struct FinderConfig {
    /// Content-similarity oracle; without one the content stage is skipped
    pub oracle: Option<Arc<dyn SimilarityOracle>>,
    /// Directory record names are resolved against for the oracle
    pub storage_root: Option<PathBuf>,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("oracle", &self.oracle.as_ref().map(|_| "<oracle>"))
            .field("storage_root", &self.storage_root)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl FinderConfig {
    /// Set the similarity oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn SimilarityOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Set the storage root used to build oracle paths.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FinderError {
    /// The working set was empty.
    #[error("No input records")]
    NoInput,

    /// The similarity threshold is outside [0.5, 1.0].
    #[error("Similarity threshold {0} is outside [0.5, 1.0]")]
    InvalidThreshold(f64),

    /// Two records share an id.
    #[error("Duplicate record id: {0}")]
    DuplicateRecordId(String),

    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Groups in `group_index` order
    pub groups: Vec<DuplicateGroup>,
    /// Records in the working set
    pub total_files: usize,
    /// Duplicate files across all groups (keep files excluded)
    pub duplicates_found: usize,
    /// Bytes reclaimable across all groups
    pub size_saved: u64,
    /// Wall-clock scan time in seconds
    pub scan_time: f64,
    /// Options the scan ran with
    pub scan_options: ScanOptions,
    /// Non-fatal events (oracle failures, dropped oracle groups)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<ScanDiagnostic>,
}

impl ScanResult {
    /// Whether any group was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Whether something was skipped or dropped along the way.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Reclaimable space as a human-readable string.
    #[must_use]
    pub fn size_saved_display(&self) -> String {
        bytesize::ByteSize::b(self.size_saved).to_string()
    }
}

/// Duplicate finder that runs the staged detection pipeline.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use stagededupe::duplicates::{DuplicateFinder, FinderConfig, ScanOptions};
/// use stagededupe::oracle::HttpSimilarityOracle;
///
/// let oracle = HttpSimilarityOracle::new("http://localhost:8001", Duration::from_secs(300))
///     .unwrap();
/// let finder = DuplicateFinder::new(FinderConfig::default().with_oracle(Arc::new(oracle)));
///
/// let result = finder.scan(Vec::new(), ScanOptions::default());
/// assert!(result.is_err());
/// ```
#[derive(Debug, Default)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a new duplicate finder with default configuration (no oracle).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The finder's configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    fn check_shutdown(&self) -> Result<(), FinderError> {
        if self.config.is_shutdown_requested() {
            log::info!("Shutdown requested, stopping scan");
            Err(FinderError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn phase_start(&self, phase: &str, total: usize) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase, total);
        }
    }

    fn phase_end(&self, phase: &str, total: usize) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_progress(total, "");
            callback.on_phase_end(phase);
        }
    }

    /// Find duplicate groups among `records`.
    ///
    /// The working set is sorted by id first, so the result depends only on
    /// the set of records and the options, never on input order (group and
    /// UUID ids aside).
    ///
    /// The shutdown flag is checked before each stage. A shutdown during the
    /// oracle call abandons the call and returns what the earlier stages found,
    /// with an `oracle_cancelled` diagnostic.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - `records` is empty
    /// - the threshold is outside [0.5, 1.0]
    /// - two records share an id
    /// - shutdown is requested before a stage starts
    pub fn scan(
        &self,
        mut records: Vec<FileRecord>,
        options: ScanOptions,
    ) -> Result<ScanResult, FinderError> {
        let start_time = Instant::now();

        if records.is_empty() {
            return Err(FinderError::NoInput);
        }
        options.validate()?;

        records.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = records.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(FinderError::DuplicateRecordId(pair[0].id.clone()));
        }

        log::info!(
            "Starting duplicate scan of {} records (threshold {})",
            records.len(),
            options.similarity_threshold
        );

        let mut claimed = ClaimedSet::new();
        let mut indexer = GroupIndexer::new();
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        let mut diagnostics: Vec<ScanDiagnostic> = Vec::new();

        // Stage 1: exact
        self.check_shutdown()?;
        if options.enable_hash_scanning {
            let unclaimed = claimed.unclaimed(&records);
            self.phase_start("exact", unclaimed.len());
            let (stage_groups, stats) = find_exact_duplicates(&unclaimed, &mut indexer);
            self.phase_end("exact", unclaimed.len());
            log::info!(
                "Exact stage: {} groups, {} duplicates among {} records",
                stats.groups,
                stats.duplicate_files,
                stats.input_files
            );
            claimed.claim_groups(&stage_groups);
            groups.extend(stage_groups);
        } else {
            log::debug!("Exact stage disabled");
        }

        // Stage 2: perceptual
        self.check_shutdown()?;
        if options.enable_metadata_scanning {
            let unclaimed = claimed.unclaimed(&records);
            self.phase_start("perceptual", unclaimed.len());
            let (stage_groups, stats) =
                cluster_similar_images(&unclaimed, options.similarity_threshold, &mut indexer);
            self.phase_end("perceptual", unclaimed.len());
            log::info!(
                "Perceptual stage: {} groups, {} duplicates among {} images",
                stats.groups,
                stats.duplicate_files,
                stats.candidates
            );
            claimed.claim_groups(&stage_groups);
            groups.extend(stage_groups);
        } else {
            log::debug!("Perceptual stage disabled");
        }

        // Stage 3: content
        self.check_shutdown()?;
        match (options.enable_content_scanning, &self.config.oracle) {
            (true, Some(oracle)) => {
                let unclaimed = claimed.unclaimed(&records);
                self.phase_start("content", unclaimed.len());
                let (stage_groups, stage_diagnostics, stats) = find_content_duplicates(
                    Arc::clone(oracle),
                    &unclaimed,
                    options.similarity_threshold,
                    self.config.storage_root.as_deref(),
                    self.config.shutdown_flag.clone(),
                    &mut indexer,
                );
                self.phase_end("content", unclaimed.len());
                log::info!(
                    "Content stage: {} groups, {} duplicates among {} files sent",
                    stats.groups,
                    stats.duplicate_files,
                    stats.files_sent
                );
                claimed.claim_groups(&stage_groups);
                groups.extend(stage_groups);
                diagnostics.extend(stage_diagnostics);
            }
            (true, None) => log::debug!("Content stage skipped: no similarity oracle configured"),
            (false, _) => log::debug!("Content stage disabled"),
        }

        debug_assert!(groups.windows(2).all(|w| w[0].group_index < w[1].group_index));

        let duplicates_found = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        let size_saved = groups.iter().map(|g| g.total_size_saved).sum();
        let scan_time = start_time.elapsed().as_secs_f64();

        log::info!(
            "Scan complete: {} groups, {} duplicates, {} reclaimable in {:.2}s",
            groups.len(),
            duplicates_found,
            bytesize::ByteSize::b(size_saved),
            scan_time
        );

        Ok(ScanResult {
            groups,
            total_files: records.len(),
            duplicates_found,
            size_saved,
            scan_time,
            scan_options: options,
            diagnostics,
        })
    }
}
