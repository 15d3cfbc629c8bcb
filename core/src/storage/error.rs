//! Error types for durable path/stats storage

use std::path::PathBuf;
use thiserror::Error;

/// Errors during chapter file operations.
///
/// Any failure here leaves the previous canonical file intact: writes go to
/// a sibling temporary file and only replace the canonical path on success.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create data directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace {path} with freshly written data")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize chapter data")]
    Serialize(#[from] serde_json::Error),
}
