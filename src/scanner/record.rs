//! Assembling [`FileRecord`]s from files on disk.
//!
//! Only failing to read the file itself is an error. Image decoding is
//! best-effort: a record whose image cannot be decoded simply carries no
//! perceptual hash or dimensions and is left out of the perceptual stage.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use super::hasher::Hasher;
use super::mime::{detect_mime, SNIFF_LEN};
use super::perceptual::PerceptualHasher;
use super::{FileRecord, RecordError};
use crate::progress::ProgressCallback;

/// Builds one [`FileRecord`] per file.
pub struct RecordBuilder {
    hasher: Hasher,
    perceptual: PerceptualHasher,
}

impl RecordBuilder {
    /// Create a builder with default hashers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
            perceptual: PerceptualHasher::new(),
        }
    }

    /// Set the shutdown flag used while hashing.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.hasher = self.hasher.with_shutdown_flag(flag);
        self
    }

    /// Build the record for `path` with a fresh UUID v4 id.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the file cannot be stat'ed or read.
    pub fn build(&self, path: &Path) -> Result<FileRecord, RecordError> {
        let metadata = std::fs::metadata(path).map_err(|e| RecordError::from_io(path, e))?;
        let created_at: DateTime<Utc> = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);

        let hashes = self.hasher.hash_file(path)?;
        let head = read_head(path)?;
        let mime_type = detect_mime(path, &head);

        let original_name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
            .into_owned();

        let mut record = FileRecord::new(
            uuid::Uuid::new_v4().to_string(),
            original_name,
            metadata.len(),
            mime_type,
            created_at,
            hashes.md5,
            hashes.sha256,
        )
        .with_path(path);

        if record.is_image() {
            match self.perceptual.summarize(path) {
                Ok(summary) => {
                    record = record
                        .with_dimensions(summary.width, summary.height)
                        .with_perceptual_hash(summary.perceptual_hash);
                }
                Err(e) => log::debug!("No perceptual hash for {}: {}", path.display(), e),
            }
        }

        log::trace!("Built record {} for {}", record.id, path.display());
        Ok(record)
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn read_head(path: &Path) -> Result<Vec<u8>, RecordError> {
    let file = File::open(path).map_err(|e| RecordError::from_io(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| RecordError::from_io(path, e))?;
    Ok(head)
}

/// Build records for `paths` in parallel.
///
/// Records come back in the order of `paths`; files that fail are returned
/// separately so one unreadable file never aborts the batch.
#[must_use]
pub fn build_records(
    paths: &[PathBuf],
    progress: Option<Arc<dyn ProgressCallback>>,
) -> (Vec<FileRecord>, Vec<RecordError>) {
    build_records_with(&RecordBuilder::new(), paths, progress, None)
}

/// Like [`build_records`] with an explicit builder and shutdown flag.
#[must_use]
pub fn build_records_with(
    builder: &RecordBuilder,
    paths: &[PathBuf],
    progress: Option<Arc<dyn ProgressCallback>>,
    shutdown_flag: Option<&AtomicBool>,
) -> (Vec<FileRecord>, Vec<RecordError>) {
    if let Some(ref callback) = progress {
        callback.on_phase_start("records", paths.len());
    }
    log::info!("Building records for {} files", paths.len());

    let results: Vec<Result<FileRecord, RecordError>> = paths
        .par_iter()
        .enumerate()
        .map(|(idx, path)| {
            if shutdown_flag.is_some_and(|f| f.load(Ordering::SeqCst)) {
                return Err(RecordError::Interrupted(path.clone()));
            }
            if let Some(ref callback) = progress {
                callback.on_progress(idx + 1, path.to_string_lossy().as_ref());
            }
            builder.build(path)
        })
        .collect();

    if let Some(ref callback) = progress {
        callback.on_phase_end("records");
    }

    let mut records = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("Skipping file: {}", e);
                errors.push(e);
            }
        }
    }
    (records, errors)
}
