//! Error types for archive operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while archiving a fragment directory.
#[derive(Error, Debug)]
pub enum BundleError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Source is not a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// File at or above the entry size ceiling
    #[error("file {} too large: {size} bytes (limit {limit})", .path.display())]
    EntryTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// File name is not valid UTF-8
    #[error("file name is not valid UTF-8: {}", .0.display())]
    InvalidEntryName(PathBuf),
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, BundleError>;
