//! Content-reconciliation stage: delegated similarity via the oracle.
//!
//! The oracle's answer is untrusted. Each proposed group is validated
//! against the unclaimed set as a whole and either accepted in full or
//! dropped in full. A dropped group is logged at `warn` and reported as a
//! [`ScanDiagnostic`]; it never fails the scan, and neither does an oracle
//! that times out, is unreachable, or answers with garbage.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::groups::{DuplicateGroup, DuplicateMatch, GroupIndexer};
use crate::oracle::{
    call_cancellable, OracleError, OracleFile, OracleGroup, OracleRequest, OracleResponse,
    SimilarityOracle,
};
use crate::scanner::FileRecord;

/// Group-level reason for content duplicates.
pub const CONTENT_GROUP_REASON: &str = "Content similarity (AI analysis)";

/// Why an oracle group was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// References an id that is not in the unclaimed set
    UnknownId,
    /// Repeats an id, or uses one taken by an earlier group of the response
    AlreadyGrouped,
    /// Carries a NaN or infinite similarity
    InvalidSimilarity,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownId => write!(f, "references an unknown or already claimed file"),
            Self::AlreadyGrouped => write!(f, "overlaps another group"),
            Self::InvalidSimilarity => write!(f, "has a non-finite similarity"),
        }
    }
}

/// A non-fatal event recorded during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanDiagnostic {
    /// The oracle did not answer in time; content stage skipped
    OracleTimeout {
        /// Transport detail
        message: String,
    },
    /// The oracle was unreachable or rejected the request; content stage skipped
    OracleUnavailable {
        /// Transport detail
        message: String,
    },
    /// The oracle's answer could not be parsed; content stage skipped
    OracleMalformed {
        /// Parser detail
        message: String,
    },
    /// The oracle call was abandoned on shutdown; content stage skipped
    OracleCancelled,
    /// One proposed group was rejected
    OracleGroupDropped {
        /// Keep id the oracle proposed
        keep_file_id: String,
        /// Rejection cause
        reason: DropReason,
        /// Every id the group referenced, keep first
        ids: Vec<String>,
    },
}

impl From<&OracleError> for ScanDiagnostic {
    fn from(error: &OracleError) -> Self {
        match error {
            OracleError::Timeout(message) => Self::OracleTimeout {
                message: message.clone(),
            },
            OracleError::Unavailable(message) => Self::OracleUnavailable {
                message: message.clone(),
            },
            OracleError::Malformed(message) => Self::OracleMalformed {
                message: message.clone(),
            },
            OracleError::Cancelled => Self::OracleCancelled,
        }
    }
}

impl std::fmt::Display for ScanDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OracleTimeout { message } => {
                write!(f, "content stage skipped, oracle timed out: {message}")
            }
            Self::OracleUnavailable { message } => {
                write!(f, "content stage skipped, oracle unavailable: {message}")
            }
            Self::OracleMalformed { message } => {
                write!(f, "content stage skipped, malformed oracle response: {message}")
            }
            Self::OracleCancelled => write!(f, "content stage skipped, oracle call cancelled"),
            Self::OracleGroupDropped {
                keep_file_id,
                reason,
                ids,
            } => write!(
                f,
                "dropped oracle group keeping {keep_file_id} ({} files): {reason}",
                ids.len()
            ),
        }
    }
}

/// Statistics from the content stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentStats {
    /// Files sent to the oracle
    pub files_sent: usize,
    /// Groups the oracle proposed
    pub groups_proposed: usize,
    /// Groups dropped during reconciliation
    pub groups_dropped: usize,
    /// Groups created
    pub groups: usize,
    /// Duplicate files found (keep files excluded)
    pub duplicate_files: usize,
}

/// Where the oracle should read `record` from.
///
/// The record's own path wins; otherwise the name is resolved under
/// `storage_root`, or passed bare.
#[must_use]
pub fn oracle_path(record: &FileRecord, storage_root: Option<&Path>) -> String {
    match (&record.path, storage_root) {
        (Some(path), _) => path.to_string_lossy().into_owned(),
        (None, Some(root)) => root.join(&record.original_name).to_string_lossy().into_owned(),
        (None, None) => record.original_name.clone(),
    }
}

/// Build the batch request for every unclaimed record.
#[must_use]
pub fn build_request(
    unclaimed: &[&FileRecord],
    threshold: f64,
    storage_root: Option<&Path>,
) -> OracleRequest {
    OracleRequest {
        files: unclaimed
            .iter()
            .map(|r| OracleFile {
                id: r.id.clone(),
                path: oracle_path(r, storage_root),
                mime_type: r.mime_type.clone(),
                size: r.size,
            })
            .collect(),
        similarity_threshold: threshold,
    }
}

/// Check one proposed group. Returns the first rule it breaks.
fn validate_group(
    group: &OracleGroup,
    known: &HashMap<&str, &FileRecord>,
    taken: &HashSet<String>,
) -> Result<(), DropReason> {
    let ids = std::iter::once(group.keep_file_id.as_str())
        .chain(group.similar_files.iter().map(|m| m.id.as_str()));

    let mut seen = HashSet::new();
    for id in ids {
        if !known.contains_key(id) {
            return Err(DropReason::UnknownId);
        }
        if !seen.insert(id) || taken.contains(id) {
            return Err(DropReason::AlreadyGrouped);
        }
    }
    if group.similar_files.iter().any(|m| !m.similarity.is_finite()) {
        return Err(DropReason::InvalidSimilarity);
    }
    Ok(())
}

/// Turn an oracle response into groups.
///
/// Groups are visited in response order. A group is accepted only if every
/// id it references is unclaimed, appears once, and was not used by an
/// earlier accepted group; otherwise it is dropped in full.
///
/// Similarities are clamped into [0, 1] and per-match reasons are kept
/// verbatim.
#[must_use]
pub fn reconcile(
    response: &OracleResponse,
    unclaimed: &[&FileRecord],
    indexer: &mut GroupIndexer,
) -> (Vec<DuplicateGroup>, Vec<ScanDiagnostic>, ContentStats) {
    let mut stats = ContentStats {
        groups_proposed: response.groups.len(),
        ..Default::default()
    };
    let known: HashMap<&str, &FileRecord> = unclaimed.iter().map(|r| (r.id.as_str(), *r)).collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut groups = Vec::new();
    let mut diagnostics = Vec::new();

    for proposed in &response.groups {
        if proposed.similar_files.is_empty() {
            log::debug!(
                "Content stage: oracle group for {} has no similar files",
                proposed.keep_file_id
            );
            continue;
        }

        if let Err(reason) = validate_group(proposed, &known, &taken) {
            let ids: Vec<String> = std::iter::once(proposed.keep_file_id.clone())
                .chain(proposed.similar_files.iter().map(|m| m.id.clone()))
                .collect();
            log::warn!(
                "Dropping oracle group keeping {} ({} files): {}",
                proposed.keep_file_id,
                ids.len(),
                reason
            );
            stats.groups_dropped += 1;
            diagnostics.push(ScanDiagnostic::OracleGroupDropped {
                keep_file_id: proposed.keep_file_id.clone(),
                reason,
                ids,
            });
            continue;
        }

        // validate_group guarantees every id is known
        let Some(&keep) = known.get(proposed.keep_file_id.as_str()) else {
            continue;
        };
        let duplicates: Vec<DuplicateMatch> = proposed
            .similar_files
            .iter()
            .filter_map(|m| {
                known.get(m.id.as_str()).map(|&file| {
                    DuplicateMatch::content(file.clone(), m.similarity.clamp(0.0, 1.0), &m.reason)
                })
            })
            .collect();

        if let Some(group) = indexer.create(keep.clone(), duplicates, CONTENT_GROUP_REASON) {
            taken.extend(group.member_ids().map(str::to_string));
            stats.duplicate_files += group.duplicate_count();
            groups.push(group);
        }
    }
    stats.groups = groups.len();

    (groups, diagnostics, stats)
}

/// Run the whole content stage against `oracle`.
///
/// Does nothing when fewer than two records are unclaimed. An oracle
/// failure skips the stage and comes back as a single diagnostic.
pub fn find_content_duplicates(
    oracle: Arc<dyn SimilarityOracle>,
    unclaimed: &[&FileRecord],
    threshold: f64,
    storage_root: Option<&Path>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    indexer: &mut GroupIndexer,
) -> (Vec<DuplicateGroup>, Vec<ScanDiagnostic>, ContentStats) {
    if unclaimed.len() < 2 {
        log::debug!(
            "Content stage: {} unclaimed file(s), nothing to compare",
            unclaimed.len()
        );
        return (Vec::new(), Vec::new(), ContentStats::default());
    }

    let request = build_request(unclaimed, threshold, storage_root);
    let files_sent = request.files.len();

    match call_cancellable(oracle, request, shutdown_flag) {
        Ok(response) => {
            let (groups, diagnostics, mut stats) = reconcile(&response, unclaimed, indexer);
            stats.files_sent = files_sent;
            (groups, diagnostics, stats)
        }
        Err(e) => {
            log::warn!("Skipping content stage: {}", e);
            let stats = ContentStats {
                files_sent,
                ..Default::default()
            };
            (Vec::new(), vec![ScanDiagnostic::from(&e)], stats)
        }
    }
}
