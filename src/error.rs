//! Exit codes and structured error reports for the binary.

use serde::Serialize;

use crate::duplicates::FinderError;

/// Process exit codes.
///
/// - 0: duplicates found, nothing skipped
/// - 1: fatal error (bad input, unreadable records file, bad config)
/// - 2: scan completed, no duplicates
/// - 3: scan completed, but a stage was skipped, an oracle group was
///   dropped, or some files could not be read
/// - 130: interrupted (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Duplicates found.
    Success = 0,
    /// Fatal error.
    GeneralError = 1,
    /// No duplicates found.
    NoDuplicates = 2,
    /// Completed with non-fatal problems.
    PartialSuccess = 3,
    /// Interrupted by user.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric process exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DD000",
            Self::GeneralError => "DD001",
            Self::NoDuplicates => "DD002",
            Self::PartialSuccess => "DD003",
            Self::Interrupted => "DD130",
        }
    }

    /// Exit code for an error that ended the run.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<FinderError>() {
            Some(FinderError::Interrupted) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Error report printed to stderr with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Machine-readable code (e.g. "DD001")
    pub code: String,
    /// Process exit code
    pub exit_code: i32,
    /// Error message including its causes
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build a report for `err`.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
