//! Similarity oracle contract.
//!
//! The oracle is an external, fallible collaborator (an embedding service in
//! practice) that proposes similarity groups for a batch of files. The
//! engine only defines the wire contract and treats every answer as
//! untrusted: see [`crate::duplicates::content`] for reconciliation.
//!
//! Wire format:
//!
//! ```json
//! // request
//! {"files": [{"id": "...", "path": "...", "mime_type": "...", "size": 1}],
//!  "similarity_threshold": 0.85}
//! // response
//! {"groups": [{"keep_file_id": "...",
//!              "similar_files": [{"id": "...", "similarity": 0.91, "reason": "..."}]}]}
//! ```

pub mod http;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpSimilarityOracle;

/// How often a cancellable oracle call checks the shutdown flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One file in an oracle request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleFile {
    /// Record id
    pub id: String,
    /// Where the oracle can read the file
    pub path: String,
    /// MIME type of the record
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
}

/// Batch request sent to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Files to compare
    pub files: Vec<OracleFile>,
    /// Minimum similarity for two files to be grouped
    pub similarity_threshold: f64,
}

/// One proposed member of an oracle group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleMatch {
    /// Record id of the similar file
    pub id: String,
    /// Similarity to the keep file
    pub similarity: f64,
    /// Human-readable explanation, reported verbatim
    pub reason: String,
}

/// One proposed group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleGroup {
    /// Record id the oracle suggests keeping
    pub keep_file_id: String,
    /// Files similar to the keep file
    pub similar_files: Vec<OracleMatch>,
}

/// Oracle response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    /// Proposed groups
    #[serde(default)]
    pub groups: Vec<OracleGroup>,
}

/// Failure kinds of an oracle call. All of them mean "skip the content stage".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The call did not finish within the configured timeout.
    #[error("Similarity oracle timed out: {0}")]
    Timeout(String),

    /// The oracle could not be reached or refused the request.
    #[error("Similarity oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered with something that is not a valid response.
    #[error("Malformed similarity oracle response: {0}")]
    Malformed(String),

    /// The call was abandoned because the scan was cancelled.
    #[error("Similarity oracle call cancelled")]
    Cancelled,
}

/// Something that can propose similarity groups.
///
/// Implementations must be callable from a worker thread; the orchestrator
/// runs the call off the scanning thread so it can be abandoned on
/// cancellation.
pub trait SimilarityOracle: Send + Sync {
    /// Propose similarity groups for `request.files`.
    ///
    /// # Errors
    ///
    /// Any [`OracleError`]; callers never retry.
    fn find_similar(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
}

/// Call `oracle`, abandoning the call if `shutdown_flag` becomes set.
///
/// Without a flag the call runs on the current thread. With one, it runs on
/// a worker thread while this thread polls the flag. Cancellation returns
/// immediately but does not abort the request itself: the abandoned worker
/// keeps its connection until the oracle answers or the client timeout
/// fires, then drops the result. Nothing it produces reaches the scan.
///
/// # Errors
///
/// The oracle's own error, or [`OracleError::Cancelled`].
pub fn call_cancellable(
    oracle: Arc<dyn SimilarityOracle>,
    request: OracleRequest,
    shutdown_flag: Option<Arc<AtomicBool>>,
) -> Result<OracleResponse, OracleError> {
    let Some(flag) = shutdown_flag else {
        return oracle.find_similar(&request);
    };
    if flag.load(Ordering::SeqCst) {
        return Err(OracleError::Cancelled);
    }

    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("similarity-oracle".to_string())
        .spawn(move || {
            let result = oracle.find_similar(&request);
            if tx.send(result).is_err() {
                log::debug!("Discarding similarity oracle response received after cancellation");
            }
        })
        .map_err(|e| OracleError::Unavailable(format!("failed to spawn oracle worker: {e}")))?;

    loop {
        match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if flag.load(Ordering::SeqCst) {
                    log::debug!("Shutdown requested, abandoning similarity oracle call");
                    return Err(OracleError::Cancelled);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(OracleError::Unavailable(
                    "oracle worker exited without a response".to_string(),
                ));
            }
        }
    }
}
