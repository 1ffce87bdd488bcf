//! Exact-match stage: identical SHA-256 content hashes.
//!
//! Partitions are emitted in the order their first member appears in the
//! (id-sorted) input, so group indices are reproducible. A record with no
//! peer is left unclaimed for the later stages.

use std::collections::HashMap;

use super::groups::{select_keep_file, DuplicateGroup, DuplicateMatch, GroupIndexer};
use crate::scanner::FileRecord;

/// Group-level reason for exact duplicates.
pub const EXACT_GROUP_REASON: &str = "Exact hash match";

/// Statistics from the exact-match stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactStats {
    /// Records that entered the stage
    pub input_files: usize,
    /// Records skipped because their SHA-256 was empty
    pub missing_hash: usize,
    /// Distinct content hashes seen
    pub distinct_hashes: usize,
    /// Groups created
    pub groups: usize,
    /// Duplicate files found (keep files excluded)
    pub duplicate_files: usize,
}

/// Group records sharing a content hash.
///
/// # Arguments
///
/// * `candidates` - Unclaimed records, in id order
/// * `indexer` - Scan-wide group index counter
#[must_use]
pub fn find_exact_duplicates(
    candidates: &[&FileRecord],
    indexer: &mut GroupIndexer,
) -> (Vec<DuplicateGroup>, ExactStats) {
    let mut stats = ExactStats {
        input_files: candidates.len(),
        ..Default::default()
    };

    let mut slot_by_hash: HashMap<&str, usize> = HashMap::with_capacity(candidates.len());
    let mut partitions: Vec<Vec<&FileRecord>> = Vec::new();

    for &record in candidates {
        if record.hash_sha256.is_empty() {
            log::debug!("Exact stage: {} has no content hash, skipping", record.id);
            stats.missing_hash += 1;
            continue;
        }
        let slot = *slot_by_hash
            .entry(record.hash_sha256.as_str())
            .or_insert_with(|| {
                partitions.push(Vec::new());
                partitions.len() - 1
            });
        partitions[slot].push(record);
    }
    stats.distinct_hashes = partitions.len();

    let mut groups = Vec::new();
    for members in partitions.into_iter().filter(|p| p.len() > 1) {
        let Some(keep) = select_keep_file(&members) else {
            continue;
        };
        let duplicates: Vec<DuplicateMatch> = members
            .iter()
            .filter(|r| r.id != keep.id)
            .map(|&r| DuplicateMatch::exact(r.clone()))
            .collect();

        log::trace!(
            "Exact stage: {} keeps {} duplicates of hash {}",
            keep.id,
            duplicates.len(),
            keep.hash_sha256
        );
        if let Some(group) = indexer.create(keep.clone(), duplicates, EXACT_GROUP_REASON) {
            stats.duplicate_files += group.duplicate_count();
            groups.push(group);
        }
    }
    stats.groups = groups.len();

    (groups, stats)
}
