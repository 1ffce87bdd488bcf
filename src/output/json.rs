//! JSON output: the [`ScanResult`] document as-is.
//!
//! Field names and nesting are those of [`ScanResult`], with `match_type`
//! lowercase and `diagnostics` omitted when empty.

use std::io::Write;

use crate::duplicates::ScanResult;

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON formatter for a scan result.
#[derive(Debug, Clone, Copy)]
pub struct JsonOutput<'a> {
    result: &'a ScanResult,
}

impl<'a> JsonOutput<'a> {
    /// Wrap a scan result.
    #[must_use]
    pub fn new(result: &'a ScanResult) -> Self {
        Self { result }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self.result)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self.result)
    }

    /// Write JSON plus a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
