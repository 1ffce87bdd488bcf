//! Perceptual-cluster stage: greedy first-fit clustering of image hashes.
//!
//! # Algorithm
//!
//! Candidates are visited in id order. Each open cluster is represented by
//! the hash of its first member, and that representative never changes. A
//! candidate joins the first cluster (in creation order) whose
//! representative is at least `threshold` similar; otherwise it opens a new
//! cluster. Clusters with two or more members become groups.
//!
//! First-fit is order-dependent: visiting the same hashes in another order
//! can cluster them differently. The fixed id order is what makes the
//! result reproducible.
//!
//! Similarity is `1 - hamming_bits / bit_length` over the hex-decoded hash.
//! Hashes of different lengths never match.

use rayon::prelude::*;

use super::groups::{keep_order, DuplicateGroup, DuplicateMatch, GroupIndexer};
use crate::scanner::FileRecord;

/// Group-level reason for perceptual duplicates.
pub const VISUAL_GROUP_REASON: &str = "Visual similarity (perceptual hash)";

/// Below this many open clusters the representative scan stays sequential.
const PARALLEL_SCAN_MIN_CLUSTERS: usize = 256;

/// A perceptual hash decoded from hex, one nibble per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptualHash {
    nibbles: Vec<u8>,
}

impl PerceptualHash {
    /// Decode a hex string (either case). Returns `None` for empty or
    /// non-hex input.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.is_empty() {
            return None;
        }
        let nibbles = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<Vec<u8>>>()?;
        Some(Self { nibbles })
    }

    /// Length of the hash in bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.nibbles.len() * 4
    }

    /// Number of differing bits, or `None` when lengths differ.
    #[must_use]
    pub fn hamming_distance(&self, other: &Self) -> Option<u32> {
        if self.nibbles.len() != other.nibbles.len() {
            return None;
        }
        Some(
            self.nibbles
                .iter()
                .zip(&other.nibbles)
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    /// Normalized similarity in [0, 1]; 0 when lengths differ.
    #[must_use]
    pub fn similarity(&self, other: &Self) -> f64 {
        match self.hamming_distance(other) {
            Some(distance) => 1.0 - f64::from(distance) / self.bit_len() as f64,
            None => 0.0,
        }
    }
}

/// An open cluster: its representative and members, as candidate indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Index of the first member, whose hash represents the cluster
    pub representative: usize,
    /// Member indices in join order (the representative first)
    pub members: Vec<usize>,
}

/// Assign each hash to a cluster, first-fit, in slice order.
///
/// Pure function of `(hashes, threshold)`. The search for a matching
/// cluster may run in parallel, but `position_first` still returns the
/// earliest-created match, and clusters are only opened between searches.
#[must_use]
pub fn assign_clusters(hashes: &[PerceptualHash], threshold: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for (idx, hash) in hashes.iter().enumerate() {
        let matches = |cluster: &Cluster| hashes[cluster.representative].similarity(hash) >= threshold;
        let hit = if clusters.len() >= PARALLEL_SCAN_MIN_CLUSTERS {
            clusters.par_iter().position_first(matches)
        } else {
            clusters.iter().position(matches)
        };

        match hit {
            Some(pos) => clusters[pos].members.push(idx),
            None => clusters.push(Cluster {
                representative: idx,
                members: vec![idx],
            }),
        }
    }

    clusters
}

/// Statistics from the perceptual stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerceptualStats {
    /// Image records with a usable perceptual hash
    pub candidates: usize,
    /// Image records whose perceptual hash was not valid hex
    pub invalid_hashes: usize,
    /// Clusters opened (singletons included)
    pub clusters: usize,
    /// Groups created
    pub groups: usize,
    /// Duplicate files found (keep files excluded)
    pub duplicate_files: usize,
}

/// Cluster visually similar images.
///
/// # Arguments
///
/// * `unclaimed` - Unclaimed records in id order; non-images and records
///   without a perceptual hash are ignored
/// * `threshold` - Inclusive similarity bound
/// * `indexer` - Scan-wide group index counter
#[must_use]
pub fn cluster_similar_images(
    unclaimed: &[&FileRecord],
    threshold: f64,
    indexer: &mut GroupIndexer,
) -> (Vec<DuplicateGroup>, PerceptualStats) {
    let mut stats = PerceptualStats::default();

    let mut candidates: Vec<&FileRecord> = Vec::new();
    let mut hashes: Vec<PerceptualHash> = Vec::new();
    for &record in unclaimed {
        if !record.is_image() {
            continue;
        }
        let Some(hex) = record.perceptual_hash.as_deref() else {
            continue;
        };
        match PerceptualHash::from_hex(hex) {
            Some(hash) => {
                candidates.push(record);
                hashes.push(hash);
            }
            None => {
                log::debug!(
                    "Perceptual stage: {} has an unusable perceptual hash {:?}, skipping",
                    record.id,
                    hex
                );
                stats.invalid_hashes += 1;
            }
        }
    }
    stats.candidates = candidates.len();

    let clusters = assign_clusters(&hashes, threshold);
    stats.clusters = clusters.len();

    let mut groups = Vec::new();
    for cluster in clusters.iter().filter(|c| c.members.len() > 1) {
        let Some(keep_idx) = cluster
            .members
            .iter()
            .copied()
            .min_by(|&a, &b| keep_order(candidates[a], candidates[b]))
        else {
            continue;
        };
        let keep_hash = &hashes[keep_idx];

        let duplicates: Vec<DuplicateMatch> = cluster
            .members
            .par_iter()
            .filter(|&&idx| idx != keep_idx)
            .map(|&idx| {
                DuplicateMatch::visual(candidates[idx].clone(), hashes[idx].similarity(keep_hash))
            })
            .collect();

        if let Some(group) =
            indexer.create(candidates[keep_idx].clone(), duplicates, VISUAL_GROUP_REASON)
        {
            stats.duplicate_files += group.duplicate_count();
            groups.push(group);
        }
    }
    stats.groups = groups.len();

    (groups, stats)
}
