//! Content hasher producing MD5 and SHA-256 digests in one streaming pass.
//!
//! SHA-256 is the content-addressing key used by the exact-match stage.
//! MD5 is carried along because upload records have always exposed it.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use md5::Md5;
use sha2::{Digest, Sha256};

use super::RecordError;

/// Read buffer size for streaming hashing (64KB).
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Hex-encoded digests of a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHashes {
    /// MD5 digest (32 hex chars)
    pub md5: String,
    /// SHA-256 digest (64 hex chars)
    pub sha256: String,
}

/// Streaming content hasher.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown flag; hashing stops between buffer reads once set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the file cannot be opened or read, or
    /// [`RecordError::Interrupted`] if shutdown was requested mid-file.
    pub fn hash_file(&self, path: &Path) -> Result<ContentHashes, RecordError> {
        let file = File::open(path).map_err(|e| RecordError::from_io(path, e))?;
        self.hash_reader(path, BufReader::with_capacity(BUFFER_SIZE, file))
    }

    /// Hash everything produced by `reader`. `path` is only used for errors.
    ///
    /// # Errors
    ///
    /// Same as [`Hasher::hash_file`].
    pub fn hash_reader<R: Read>(
        &self,
        path: &Path,
        mut reader: R,
    ) -> Result<ContentHashes, RecordError> {
        let mut md5 = Md5::new();
        let mut sha256 = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            if self.is_shutdown_requested() {
                return Err(RecordError::Interrupted(path.to_path_buf()));
            }
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RecordError::from_io(path, e)),
            };
            md5.update(&buffer[..read]);
            sha256.update(&buffer[..read]);
        }

        Ok(ContentHashes {
            md5: format!("{:x}", md5.finalize()),
            sha256: format!("{:x}", sha256.finalize()),
        })
    }
}
