//! MIME type detection.
//!
//! Image formats are sniffed from the leading bytes through `image`'s format
//! detection, so a renamed PNG is still `image/png`. Everything else falls
//! back to the file extension.

use std::path::Path;

use image::ImageFormat;

/// MIME type used when nothing else matches.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Number of leading bytes worth reading for content sniffing.
pub const SNIFF_LEN: usize = 64;

/// Detect the MIME type from the file's first bytes and its name.
#[must_use]
pub fn detect_mime(path: &Path, head: &[u8]) -> String {
    if let Ok(format) = image::guess_format(head) {
        return format.to_mime_type().to_string();
    }

    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
    else {
        return FALLBACK_MIME.to_string();
    };

    if let Some(format) = ImageFormat::from_extension(&ext) {
        return format.to_mime_type().to_string();
    }

    mime_for_extension(&ext).unwrap_or(FALLBACK_MIME).to_string()
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime)
}
