//! Write-to-temp-then-rename output files.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StoreError;

/// An output file that only appears at its final path once committed.
///
/// The data is written to a hidden temporary file in the same directory,
/// then renamed over the target. Dropping without committing removes the
/// temporary file and leaves any existing target untouched.
#[derive(Debug)]
pub struct AtomicFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl AtomicFile {
    /// Create the temporary file next to `target`.
    pub fn create(target: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let target = target.into();
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".hashdex-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { temp, target })
    }

    /// Path of the temporary file while it is being written.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Final destination.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// A second handle to the temporary file, e.g. for a writer thread.
    pub fn handle(&self) -> Result<File, StoreError> {
        self.temp
            .as_file()
            .try_clone()
            .map_err(|e| StoreError::io(self.temp.path(), e))
    }

    /// Sync and rename the temporary file into place.
    pub fn commit(self) -> Result<PathBuf, StoreError> {
        self.temp
            .as_file()
            .sync_all()
            .map_err(|e| StoreError::io(self.temp.path(), e))?;
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| StoreError::Io {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_commit_replaces_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out.txt");
        std::fs::write(&target, "old").unwrap();

        let atomic = AtomicFile::create(&target).unwrap();
        let mut handle = atomic.handle().unwrap();
        handle.write_all(b"new").unwrap();
        drop(handle);

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
        atomic.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_drop_leaves_target_untouched() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out.txt");
        std::fs::write(&target, "old").unwrap();

        let atomic = AtomicFile::create(&target).unwrap();
        let temp_path = atomic.temp_path().to_path_buf();
        atomic.handle().unwrap().write_all(b"partial").unwrap();
        drop(atomic);

        assert!(!temp_path.exists());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
    }
}
