//! In-memory set of previously indexed records.

use std::path::Path;
use std::sync::Arc;

use hashdex_core::FileRecord;

use crate::error::StoreError;
use crate::manifest::read_manifest;

/// Records from an earlier run, queried while a new run is in flight.
///
/// Built once before a pipeline starts and shared read-only between hash
/// workers, so lookups need no locking. Queries are linear scans that keep
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct FileDatabase {
    records: Vec<Arc<FileRecord>>,
}

impl FileDatabase {
    /// Create a database from owned records.
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    /// Load the records of a manifest file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(read_manifest(path)?))
    }

    /// All records whose size is `size`.
    pub fn find_by_size(&self, size: u64) -> Vec<&Arc<FileRecord>> {
        self.records.iter().filter(|r| r.size == size).collect()
    }

    /// All records whose SHA-1 is `sha1`.
    pub fn find_by_sha1(&self, sha1: &str) -> Vec<&Arc<FileRecord>> {
        if sha1.is_empty() {
            return Vec::new();
        }
        self.records.iter().filter(|r| r.sha1 == sha1).collect()
    }

    /// Append a record unless this exact allocation is already held.
    ///
    /// The check is by pointer identity, not content: a freshly built record
    /// equal to a stored one is still appended. Returns whether it was added.
    pub fn add(&mut self, record: Arc<FileRecord>) -> bool {
        if self.records.iter().any(|r| Arc::ptr_eq(r, &record)) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the database holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FileRecord>> {
        self.records.iter()
    }

    /// The records as a slice.
    pub fn records(&self) -> &[Arc<FileRecord>] {
        &self.records
    }
}

impl FromIterator<FileRecord> for FileDatabase {
    fn from_iter<T: IntoIterator<Item = FileRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashdex_core::FileMode;
    use std::time::UNIX_EPOCH;

    fn rec(path: &str, size: u64, sha1: &str) -> FileRecord {
        let mut r = FileRecord::new(path, size, UNIX_EPOCH, FileMode::regular(0o644));
        r.sha1 = sha1.to_string();
        r
    }

    #[test]
    fn test_find_by_size_keeps_order() {
        let db: FileDatabase = vec![rec("a", 10, "h1"), rec("b", 20, "h2"), rec("c", 10, "h3")]
            .into_iter()
            .collect();
        let paths: Vec<&str> = db.find_by_size(10).iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "c"]);
        assert!(db.find_by_size(99).is_empty());
    }

    #[test]
    fn test_find_by_sha1() {
        let db = FileDatabase::new(vec![rec("a", 1, "h1"), rec("b", 1, "h1"), rec("c", 2, "")]);
        assert_eq!(db.find_by_sha1("h1").len(), 2);
        assert!(db.find_by_sha1("").is_empty());
    }

    #[test]
    fn test_add_is_identity_guard_only() {
        let mut db = FileDatabase::default();
        let shared = Arc::new(rec("a", 1, "h1"));

        assert!(db.add(Arc::clone(&shared)));
        assert!(!db.add(Arc::clone(&shared)));
        assert!(db.add(Arc::new(rec("a", 1, "h1"))));
        assert_eq!(db.len(), 2);
    }
}
