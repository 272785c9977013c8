//! Errors from reading and writing persisted artifacts.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by manifest and signature index I/O.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file does not exist. Callers usually treat this as "no prior index".
    #[error("Not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV layer rejected a row or could not write one.
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A manifest row parsed as CSV but holds an invalid value.
    #[error("Malformed manifest row {line} in {path}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// A signature index line is not `<hash>-<size>`.
    #[error("Malformed signature line {line} in {path}: {content:?}")]
    MalformedSignature {
        path: PathBuf,
        line: usize,
        content: String,
    },
}

impl StoreError {
    /// Create an I/O error with path context, keeping "not found" distinct.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error only says the file is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinct() {
        let err = StoreError::io(
            "/no/such.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.is_not_found());

        let err = StoreError::io(
            "/locked.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_not_found());
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
