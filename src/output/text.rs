//! Human-readable report.

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::duplicates::ScanResult;

/// Plain-text formatter for a scan result.
pub struct TextOutput<'a> {
    result: &'a ScanResult,
}

impl<'a> TextOutput<'a> {
    /// Wrap a scan result.
    #[must_use]
    pub fn new(result: &'a ScanResult) -> Self {
        Self { result }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let result = self.result;

        for group in &result.groups {
            writeln!(
                writer,
                "Group {} ({}, {} reclaimable)",
                group.group_index + 1,
                group.reason,
                ByteSize::b(group.total_size_saved)
            )?;
            writeln!(
                writer,
                "  keep       {} [{}]",
                group.keep_file.original_name, group.keep_file.id
            )?;
            for dup in &group.duplicates {
                writeln!(
                    writer,
                    "  {:<10} {} [{}] {:.1}% {}",
                    dup.match_type,
                    dup.file.original_name,
                    dup.file.id,
                    dup.similarity * 100.0,
                    dup.reason
                )?;
            }
            writeln!(writer)?;
        }

        if !result.diagnostics.is_empty() {
            writeln!(writer, "Warnings:")?;
            for diagnostic in &result.diagnostics {
                writeln!(writer, "  - {diagnostic}")?;
            }
            writeln!(writer)?;
        }

        writeln!(
            writer,
            "{} files scanned, {} duplicate groups, {} duplicates, {} reclaimable ({:.2}s)",
            result.total_files,
            result.groups.len(),
            result.duplicates_found,
            result.size_saved_display(),
            result.scan_time
        )
    }

    /// Render the report to a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
