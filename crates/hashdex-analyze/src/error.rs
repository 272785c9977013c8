//! Errors from reading external checksum manifests.

use std::path::PathBuf;

use thiserror::Error;

use hashdex_core::HashType;

/// Fatal problems with an external manifest.
///
/// Lines that simply do not look like `<hash> <path>` are skipped with a
/// warning and never produce one of these.
#[derive(Debug, Error)]
pub enum ExternError {
    /// The file could not be opened or read.
    #[error("Cannot read external manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A well-formed line whose digest length matches no known algorithm.
    #[error("Unknown hash length {length} on line {line}")]
    UnknownHashLength { line: usize, length: usize },

    /// A line whose digest algorithm differs from the earlier lines.
    #[error("Inconsistent hash on line {line}: manifest is {expected}, line is {found}")]
    InconsistentHash {
        line: usize,
        expected: HashType,
        found: HashType,
    },
}

impl ExternError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the manifest mixed hash algorithms.
    pub fn is_inconsistent_hash(&self) -> bool {
        matches!(self, Self::InconsistentHash { .. })
    }
}
