//! File record supplier: directory traversal, content hashing and image metadata.
//!
//! The detection engine in [`crate::duplicates`] never touches file bytes. It
//! consumes [`FileRecord`]s, and this module is the reference way to produce
//! them from files on disk.
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: MD5 + SHA-256 content hashing (single streaming pass)
//! - [`mime`]: MIME type detection
//! - [`perceptual`]: Image decoding, dimensions and pHash
//! - [`record`]: Assembling all of the above into a [`FileRecord`]
//!
//! # Example
//!
//! ```no_run
//! use stagededupe::scanner::{build_records, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("./uploads"), WalkerConfig::default());
//! let paths: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! let (records, errors) = build_records(&paths, None);
//! println!("{} records, {} unreadable files", records.len(), errors.len());
//! ```

pub mod hasher;
pub mod mime;
pub mod perceptual;
pub mod record;
pub mod walker;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export main types
pub use hasher::{ContentHashes, Hasher};
pub use perceptual::{ImageSummary, PerceptualHasher};
pub use record::{build_records, RecordBuilder};
pub use walker::Walker;

/// Immutable snapshot of one uploaded file.
///
/// `id` must be unique within a working set. Optional fields are only
/// present when extraction succeeded; stages that need them skip records
/// without them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Opaque unique identifier
    pub id: String,
    /// Name the file was uploaded under
    pub original_name: String,
    /// File size in bytes
    pub size: u64,
    /// Detected MIME type
    pub mime_type: String,
    /// Creation timestamp, used to pick the file to keep
    pub created_at: DateTime<Utc>,
    /// MD5 of the content (lowercase hex)
    pub hash_md5: String,
    /// SHA-256 of the content (lowercase hex), the exact-match key
    pub hash_sha256: String,
    /// Perceptual hash (lowercase hex), decodable raster images only
    #[serde(default)]
    pub perceptual_hash: Option<String>,
    /// Image width in pixels
    #[serde(default)]
    pub width: Option<u32>,
    /// Image height in pixels
    #[serde(default)]
    pub height: Option<u32>,
    /// Storage location handed to the similarity oracle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FileRecord {
    /// Create a record with the mandatory fields and no image metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        original_name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        created_at: DateTime<Utc>,
        hash_md5: impl Into<String>,
        hash_sha256: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            original_name: original_name.into(),
            size,
            mime_type: mime_type.into(),
            created_at,
            hash_md5: hash_md5.into(),
            hash_sha256: hash_sha256.into(),
            perceptual_hash: None,
            width: None,
            height: None,
            path: None,
        }
    }

    /// Attach a perceptual hash.
    #[must_use]
    pub fn with_perceptual_hash(mut self, hash: impl Into<String>) -> Self {
        self.perceptual_hash = Some(hash.into());
        self
    }

    /// Attach image dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Attach the storage path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Whether the MIME type is in the `image/` family.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,
}

/// Errors that can occur while turning files into records.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Record building was interrupted by the shutdown flag.
    #[error("Interrupted while reading {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    /// Classify an I/O error for `path`.
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
