//! The per-file record that flows through the indexing pipeline.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::hash_type::HashType;
use crate::mode::FileMode;

/// One regular file observed during a walk.
///
/// `size`, `modified` and `mode` are captured by the walker. The digests are
/// filled in by exactly one hash worker; an empty string means "not computed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Root-relative path as UTF-8 text, lossy if the native path is not.
    pub path: String,

    /// Root-relative path as the filesystem knows it, used to reopen the file.
    pub native_path: PathBuf,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time.
    pub modified: SystemTime,

    /// Type and permission bits.
    pub mode: FileMode,

    /// Lowercase hex SHA-1, empty until computed.
    pub sha1: String,

    /// Lowercase hex MD5, empty unless requested and computed.
    pub md5: String,

    /// Failure attached to this entry, if any.
    pub error: Option<RecordError>,
}

impl FileRecord {
    /// Create a record from a root-relative native path.
    ///
    /// Paths that are not valid UTF-8 get a lossy display path and an
    /// [`RecordError::InvalidPath`] error; `native_path` keeps the original.
    pub fn new(native_path: impl Into<PathBuf>, size: u64, modified: SystemTime, mode: FileMode) -> Self {
        let native_path = native_path.into();
        let (path, error) = display_path(&native_path);
        Self {
            path,
            native_path,
            size,
            modified,
            mode,
            sha1: String::new(),
            md5: String::new(),
            error,
        }
    }

    /// Create a record for an entry whose metadata could not be read.
    pub fn failed(native_path: impl Into<PathBuf>, error: RecordError) -> Self {
        let mut record = Self::new(native_path, 0, UNIX_EPOCH, FileMode(0));
        record.error = Some(error);
        record
    }

    /// Modification time as whole seconds since the Unix epoch.
    pub fn modified_secs(&self) -> i64 {
        match self.modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs_f64().ceil() as i64),
        }
    }

    /// Convert epoch seconds back into a `SystemTime`.
    pub fn time_from_secs(secs: i64) -> SystemTime {
        if secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(secs as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
        }
    }

    /// Digest of the given algorithm, if one was computed.
    pub fn digest(&self, hash_type: HashType) -> Option<&str> {
        let value = match hash_type {
            HashType::Sha1 => &self.sha1,
            HashType::Md5 => &self.md5,
        };
        (!value.is_empty()).then_some(value.as_str())
    }

    /// Whether the file behind this record should be opened and hashed.
    pub fn is_hashable(&self) -> bool {
        self.error.as_ref().is_none_or(RecordError::is_hashable)
    }

    /// Attach an error unless a hard failure is already present.
    ///
    /// An [`RecordError::InvalidPath`] only flags the display path, so a later
    /// hashing failure replaces it; `path` still shows the lossy text.
    pub fn set_error(&mut self, error: RecordError) {
        if self.is_hashable() {
            self.error = Some(error);
        }
    }

    /// Absolute path of the file under `root`.
    pub fn full_path(&self, root: &Path) -> PathBuf {
        root.join(&self.native_path)
    }
}

/// Produce display text for a native path.
fn display_path(path: &Path) -> (String, Option<RecordError>) {
    match path.to_str() {
        Some(s) => (s.to_string(), None),
        None => {
            let lossy = path.to_string_lossy().into_owned();
            let error = RecordError::InvalidPath {
                lossy: lossy.clone(),
            };
            (lossy, Some(error))
        }
    }
}
