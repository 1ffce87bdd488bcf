//! Image decoding and perceptual hashing for record building.
//!
//! Produces the 64-bit DCT pHash stored in [`super::FileRecord::perceptual_hash`]
//! as lowercase hex. Similarity between two such hashes is computed by the
//! perceptual-cluster stage, not here.

use std::path::Path;

use image_hasher::{HashAlg, HasherConfig};
use thiserror::Error;

/// Errors that can occur during perceptual hashing.
#[derive(Debug, Error)]
pub enum PerceptualError {
    /// Failed to open or decode the image.
    #[error("Failed to load image {0}: {1}")]
    LoadError(String, #[source] image::ImageError),
}

/// Metadata extracted from a decodable raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// pHash as lowercase hex (16 chars for the default 8x8 hash)
    pub perceptual_hash: String,
}

/// Computes perceptual hashes for images.
pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    /// Create a pHash hasher (DCT preprocessing, median threshold, 8x8 bits).
    #[must_use]
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }

    /// Decode the image at `path` and summarize it.
    ///
    /// # Errors
    ///
    /// Returns [`PerceptualError::LoadError`] when the file is not a
    /// decodable image.
    pub fn summarize<P: AsRef<Path>>(&self, path: P) -> Result<ImageSummary, PerceptualError> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| PerceptualError::LoadError(path.display().to_string(), e))?;

        let hash = self.hasher.hash_image(&img);
        Ok(ImageSummary {
            width: img.width(),
            height: img.height(),
            perceptual_hash: bytes_to_hex(hash.as_bytes()),
        })
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
