//! Directory walker using jwalk for parallel traversal.
//!
//! Children are sorted by file name so the produced path list is stable
//! across runs; the engine sorts records by id anyway, but stable input keeps
//! record building reproducible.
//!
//! # Example
//!
//! ```no_run
//! use stagededupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("./uploads"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{RecordError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
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

    /// Validate that the root exists and is a directory.
    ///
    /// # Errors
    ///
    /// [`RecordError::NotFound`] or [`RecordError::NotADirectory`].
    pub fn validate_root(&self) -> Result<(), RecordError> {
        if !self.root.exists() {
            return Err(RecordError::NotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(RecordError::NotADirectory(self.root.clone()));
        }
        Ok(())
    }

    /// Walk the directory tree, yielding regular file paths.
    ///
    /// Unreadable entries are yielded as errors so the caller can report
    /// them and carry on.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, RecordError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    let file_type = entry.file_type();

                    if file_type.is_dir() {
                        return None;
                    }
                    if file_type.is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    let metadata = match std::fs::metadata(&path) {
                        Ok(m) => m,
                        Err(e) => {
                            log::warn!("Cannot stat {}: {}", path.display(), e);
                            return Some(Err(RecordError::from_io(&path, e)));
                        }
                    };
                    if !metadata.is_file() {
                        return None;
                    }
                    if self.config.max_size.is_some_and(|max| metadata.len() > max) {
                        log::debug!(
                            "Skipping file over size limit ({} bytes): {}",
                            metadata.len(),
                            path.display()
                        );
                        return None;
                    }

                    Some(Ok(path))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(RecordError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }))
                }
            }
        })
    }
}
