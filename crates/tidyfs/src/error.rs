use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TidyError {
    /// The path was never scanned into the cache.
    #[error("Path not cached: {0}")]
    NotFound(PathBuf),

    /// The path is cached but the filesystem disagrees with the recorded mtime.
    #[error("Cached entry is stale: {0}")]
    Stale(PathBuf),

    #[error("OS operation failed on {path}: {message}")]
    Os { path: PathBuf, message: String },

    #[error("Destination already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TidyError {
    /// Wraps an OS error together with the path it happened on.
    pub fn os(path: &Path, error: io::Error) -> Self {
        Self::Os {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }

    /// True for the two lookup-miss variants that a rescan can fix.
    pub fn needs_rescan(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Stale(_))
    }
}

pub type Result<T> = std::result::Result<T, TidyError>;

/// Canonicalizes a path, returning the original if canonicalization fails.
pub fn canonicalize_existing_path(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path).unwrap_or(path)
}
