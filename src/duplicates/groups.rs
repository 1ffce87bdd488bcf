//! Duplicate groups, matches and keep-file selection.
//!
//! # Overview
//!
//! Every stage reports its findings as [`DuplicateGroup`]s: one
//! `keep_file` plus the [`DuplicateMatch`]es that could be removed in its
//! favor. Groups are created through a [`GroupIndexer`], which owns the
//! scan-wide `group_index` counter, and are never mutated afterwards.
//!
//! # Keep-file rule
//!
//! The earliest `created_at` wins. Equal timestamps (common for batch
//! uploads) fall back to the lexicographically smallest `id`, so the choice
//! never depends on input order.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use stagededupe::duplicates::{DuplicateMatch, GroupIndexer, MatchType};
//! use stagededupe::scanner::FileRecord;
//!
//! let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let a = FileRecord::new("a", "a.txt", 10, "text/plain", t, "m", "s");
//! let b = FileRecord::new("b", "b.txt", 10, "text/plain", t, "m", "s");
//!
//! let mut indexer = GroupIndexer::new();
//! let group = indexer
//!     .create(a, vec![DuplicateMatch::exact(b)], "Exact hash match")
//!     .unwrap();
//!
//! assert_eq!(group.group_index, 0);
//! assert_eq!(group.total_size_saved, 10);
//! assert_eq!(group.duplicates[0].match_type, MatchType::Exact);
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::scanner::FileRecord;

/// How a duplicate was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Identical content hash
    Exact,
    /// Perceptual hash within the similarity threshold
    Visual,
    /// Similarity proposed by the content oracle
    Content,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => f.pad("exact"),
            Self::Visual => f.pad("visual"),
            Self::Content => f.pad("content"),
        }
    }
}

/// Per-match reason for exact duplicates.
pub const EXACT_MATCH_REASON: &str = "Identical file hash";
/// Per-match reason for perceptual duplicates.
pub const VISUAL_MATCH_REASON: &str = "Visually similar image";

/// One file that duplicates a group's keep file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// The duplicate file
    pub file: FileRecord,
    /// Similarity to the keep file, in [0, 1]; 1.0 exactly for exact matches
    pub similarity: f64,
    /// Human-readable explanation
    pub reason: String,
    /// Detection method
    pub match_type: MatchType,
}

impl DuplicateMatch {
    /// Byte-identical duplicate.
    #[must_use]
    pub fn exact(file: FileRecord) -> Self {
        Self {
            file,
            similarity: 1.0,
            reason: EXACT_MATCH_REASON.to_string(),
            match_type: MatchType::Exact,
        }
    }

    /// Perceptually similar image.
    #[must_use]
    pub fn visual(file: FileRecord, similarity: f64) -> Self {
        Self {
            file,
            similarity,
            reason: VISUAL_MATCH_REASON.to_string(),
            match_type: MatchType::Visual,
        }
    }

    /// Content-similar file, with the oracle's reason verbatim.
    #[must_use]
    pub fn content(file: FileRecord, similarity: f64, reason: impl Into<String>) -> Self {
        Self {
            file,
            similarity,
            reason: reason.into(),
            match_type: MatchType::Content,
        }
    }
}

/// A keep file and its duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Unique group id (UUID v4)
    pub id: String,
    /// Scan-wide discovery order, shared across all stages
    pub group_index: usize,
    /// The file to retain
    pub keep_file: FileRecord,
    /// Files that can be removed; never empty, never contains `keep_file`
    pub duplicates: Vec<DuplicateMatch>,
    /// Why these files were grouped
    pub reason: String,
    /// Sum of the duplicates' sizes
    pub total_size_saved: u64,
}

impl DuplicateGroup {
    /// Number of duplicate files (excluding the keep file).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Number of files in the group, keep file included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.duplicates.len() + 1
    }

    /// Groups always hold at least the keep file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Ids of every member, keep file first.
    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.keep_file.id.as_str())
            .chain(self.duplicates.iter().map(|d| d.file.id.as_str()))
    }

    /// Detection method shared by the group's matches.
    #[must_use]
    pub fn match_type(&self) -> Option<MatchType> {
        self.duplicates.first().map(|d| d.match_type)
    }
}

/// Issues group indices in creation order for one scan.
#[derive(Debug, Default)]
pub struct GroupIndexer {
    next: usize,
}

impl GroupIndexer {
    /// Start counting from 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group with the next index.
    ///
    /// Returns `None` (and consumes no index) when `duplicates` is empty.
    pub fn create(
        &mut self,
        keep_file: FileRecord,
        duplicates: Vec<DuplicateMatch>,
        reason: impl Into<String>,
    ) -> Option<DuplicateGroup> {
        if duplicates.is_empty() {
            return None;
        }
        debug_assert!(duplicates.iter().all(|d| d.file.id != keep_file.id));

        let group = DuplicateGroup {
            id: uuid::Uuid::new_v4().to_string(),
            group_index: self.next,
            total_size_saved: duplicates.iter().map(|d| d.file.size).sum(),
            keep_file,
            duplicates,
            reason: reason.into(),
        };
        self.next += 1;
        Some(group)
    }

    /// Number of groups created so far.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.next
    }
}

/// Ordering used to pick the keep file: earliest `created_at`, then smallest `id`.
#[must_use]
pub fn keep_order(a: &FileRecord, b: &FileRecord) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Pick the keep file among `members` (see [`keep_order`]).
#[must_use]
pub fn select_keep_file<'a>(members: &[&'a FileRecord]) -> Option<&'a FileRecord> {
    members.iter().copied().min_by(|a, b| keep_order(a, b))
}
