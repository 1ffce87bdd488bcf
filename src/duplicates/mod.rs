//! Duplicate detection module.
//!
//! This module provides:
//! - Exact content-hash matching (stage 1)
//! - Perceptual-hash clustering of images (stage 2)
//! - Content-similarity reconciliation through an oracle (stage 3)
//! - The orchestrator that threads the claimed set between them

pub mod claims;
pub mod content;
pub mod exact;
pub mod finder;
pub mod groups;
pub mod perceptual;

pub use claims::ClaimedSet;
pub use content::{
    build_request, find_content_duplicates, reconcile, ContentStats, DropReason, ScanDiagnostic,
    CONTENT_GROUP_REASON,
};
pub use exact::{find_exact_duplicates, ExactStats, EXACT_GROUP_REASON};
pub use finder::{
    DuplicateFinder, FinderConfig, FinderError, ScanOptions, ScanResult,
    DEFAULT_SIMILARITY_THRESHOLD, MAX_SIMILARITY_THRESHOLD, MIN_SIMILARITY_THRESHOLD,
};
pub use groups::{
    keep_order, select_keep_file, DuplicateGroup, DuplicateMatch, GroupIndexer, MatchType,
    EXACT_MATCH_REASON, VISUAL_MATCH_REASON,
};
pub use perceptual::{
    assign_clusters, cluster_similar_images, Cluster, PerceptualHash, PerceptualStats,
    VISUAL_GROUP_REASON,
};
