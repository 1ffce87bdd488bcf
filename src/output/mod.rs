//! Output formatters for scan results.
//!
//! - JSON: the full result document, for automation
//! - CSV: one row per file, for spreadsheets
//! - Text: a readable report for the terminal
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use stagededupe::duplicates::{DuplicateFinder, ScanOptions};
//! use stagededupe::output::JsonOutput;
//! use stagededupe::scanner::FileRecord;
//!
//! let t = Utc.timestamp_opt(0, 0).unwrap();
//! let records = vec![FileRecord::new("a", "a.txt", 1, "text/plain", t, "m", "s")];
//! let result = DuplicateFinder::with_defaults()
//!     .scan(records, ScanOptions::default())
//!     .unwrap();
//!
//! let json = JsonOutput::new(&result).to_json().unwrap();
//! assert!(json.contains("\"groups\":[]"));
//! ```

pub mod csv;
pub mod json;
pub mod text;

pub use self::csv::{CsvOutput, CsvOutputError};
pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;
