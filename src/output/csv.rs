//! CSV output: one row per file in every group.
//!
//! # Columns
//!
//! - `group_index`: scan-wide group number
//! - `role`: `keep` or `duplicate`
//! - `id`, `original_name`, `size`, `created_at` (RFC 3339): the file
//! - `match_type`, `similarity`, `reason`: empty on keep rows
//!
//! Keep rows come first within each group.

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::duplicates::{DuplicateGroup, MatchType};
use crate::scanner::FileRecord;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group_index: usize,
    role: &'static str,
    id: &'a str,
    original_name: &'a str,
    size: u64,
    created_at: String,
    match_type: Option<MatchType>,
    similarity: Option<f64>,
    reason: &'a str,
}

impl<'a> CsvRow<'a> {
    fn keep(group: &'a DuplicateGroup) -> Self {
        Self::file(group.group_index, "keep", &group.keep_file)
    }

    fn file(group_index: usize, role: &'static str, file: &'a FileRecord) -> Self {
        Self {
            group_index,
            role,
            id: &file.id,
            original_name: &file.original_name,
            size: file.size,
            created_at: file.created_at.to_rfc3339(),
            match_type: None,
            similarity: None,
            reason: "",
        }
    }
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for group in self.groups {
            csv_writer.serialize(CsvRow::keep(group))?;
            for dup in &group.duplicates {
                csv_writer.serialize(CsvRow {
                    match_type: Some(dup.match_type),
                    similarity: Some(dup.similarity),
                    reason: &dup.reason,
                    ..CsvRow::file(group.group_index, "duplicate", &dup.file)
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
