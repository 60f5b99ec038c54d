//! Error types for the integrity engine
//!
//! Unreadable files are not errors: the digest engine and scanner absorb them
//! and the file is simply missing from the snapshot.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FimError>;

#[derive(Debug, Error)]
pub enum FimError {
    /// Caller asked for a hash algorithm we do not implement
    #[error("Unsupported hash algorithm: {0}")]
    InvalidAlgorithm(String),

    /// Unknown ignore engine name
    #[error("Unsupported ignore engine: {0} (expected 'gitignore' or 'glob')")]
    InvalidEngine(String),

    /// Polling interval below one second
    #[error("Polling interval must be at least 1 second (got {0})")]
    InvalidInterval(u64),

    /// Watched path is missing or not a directory
    #[error("Provided path is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// Baseline file could not be read or written
    #[error("Baseline storage failed for {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Baseline file exists but is not a valid snapshot
    #[error("Baseline file {} is corrupt: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Ignore rules file exists but could not be read
    #[error("Failed to read ignore rules {}: {source}", path.display())]
    Rules {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file unreadable or invalid
    #[error("Invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// Scan interrupted at a safe point; nothing was published
    #[error("Scan cancelled")]
    Cancelled,
}

impl FimError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FimError::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FimError::Cancelled)
    }
}
