//! Error types shared across the indexing pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors that abort an indexing run.
///
/// Problems with individual files never surface here; they travel on the
/// record as a [`RecordError`].
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The private output file could not be created.
    #[error("Cannot create temporary manifest in {dir}: {source}")]
    TempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The finished manifest could not be moved into place.
    #[error("Cannot finalize manifest {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest writer failed mid-stream.
    #[error("Manifest writer failed: {message}")]
    Writer { message: String },

    /// A pipeline thread panicked or could not be spawned.
    #[error("Pipeline thread `{name}` failed: {message}")]
    Thread { name: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// A per-file failure, carried on the record it belongs to.
///
/// Holds message text rather than `io::Error` so records stay `Clone` and can
/// be written to, and read back from, a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RecordError {
    /// Metadata could not be read during the walk.
    #[error("stat failed: {message}")]
    Stat { message: String },

    /// The file could not be opened for hashing.
    #[error("open failed: {message}")]
    Open { message: String },

    /// Opening the file did not finish within the configured bound.
    #[error("open timed out after {}ms", timeout.as_millis())]
    OpenTimeout { timeout: Duration },

    /// Reading file contents failed part way.
    #[error("read failed: {message}")]
    Read { message: String },

    /// The path is not valid UTF-8; `path` on the record is a lossy stand-in.
    #[error("path is not valid UTF-8: {lossy}")]
    InvalidPath { lossy: String },

    /// Error text read back from a previously written manifest.
    #[error("{0}")]
    Recorded(String),
}

impl RecordError {
    pub fn stat(err: &dyn std::fmt::Display) -> Self {
        Self::Stat {
            message: err.to_string(),
        }
    }

    pub fn open(err: &std::io::Error) -> Self {
        Self::Open {
            message: err.to_string(),
        }
    }

    pub fn read(err: &std::io::Error) -> Self {
        Self::Read {
            message: err.to_string(),
        }
    }

    /// Whether the file behind a record carrying this error can still be hashed.
    pub fn is_hashable(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }
}
