//! Digest reuse from a previous run.

use std::collections::HashMap;
use std::sync::Arc;

use hashdex_core::{FileRecord, ReuseMode};
use hashdex_store::FileDatabase;

/// Digests taken from an earlier record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDigest {
    pub sha1: String,
    /// Empty when the earlier run did not compute MD5.
    pub md5: String,
}

impl CachedDigest {
    /// Digests of a prior record, if it was hashed cleanly.
    pub fn from_record(record: &FileRecord) -> Option<Self> {
        if record.sha1.is_empty() || record.error.is_some() {
            return None;
        }
        Some(Self {
            sha1: record.sha1.clone(),
            md5: record.md5.clone(),
        })
    }

    /// Whether every digest the run needs is present.
    pub fn covers(&self, need_md5: bool) -> bool {
        !self.sha1.is_empty() && (!need_md5 || !self.md5.is_empty())
    }
}

/// Supplies digests for a record without reading the file.
///
/// Shared by every hash worker, so implementations must be thread-safe.
pub trait DigestCache: Send + Sync {
    fn lookup(&self, record: &FileRecord) -> Option<CachedDigest>;
}

impl<F> DigestCache for F
where
    F: Fn(&FileRecord) -> Option<CachedDigest> + Send + Sync,
{
    fn lookup(&self, record: &FileRecord) -> Option<CachedDigest> {
        self(record)
    }
}

/// Never hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl DigestCache for NoCache {
    fn lookup(&self, _record: &FileRecord) -> Option<CachedDigest> {
        None
    }
}

/// Reuses a prior record with the same relative path, size and mtime.
#[derive(Debug, Default)]
pub struct PathMatchCache {
    by_path: HashMap<String, Arc<FileRecord>>,
}

impl PathMatchCache {
    pub fn new(db: &FileDatabase) -> Self {
        let by_path = db
            .iter()
            .map(|r| (r.path.clone(), Arc::clone(r)))
            .collect();
        Self { by_path }
    }
}

impl DigestCache for PathMatchCache {
    fn lookup(&self, record: &FileRecord) -> Option<CachedDigest> {
        let prior = self.by_path.get(&record.path)?;
        if prior.size != record.size || prior.modified_secs() != record.modified_secs() {
            return None;
        }
        CachedDigest::from_record(prior)
    }
}

/// Reuses the first prior record of the same size.
///
/// Size alone does not identify content: two different files of equal
/// length get the same digest. Only useful when files are known to be
/// immutable and sizes distinct.
#[derive(Debug)]
pub struct SizeMatchCache {
    db: Arc<FileDatabase>,
}

impl SizeMatchCache {
    pub fn new(db: Arc<FileDatabase>) -> Self {
        Self { db }
    }
}

impl DigestCache for SizeMatchCache {
    fn lookup(&self, record: &FileRecord) -> Option<CachedDigest> {
        self.db
            .find_by_size(record.size)
            .into_iter()
            .find_map(|prior| CachedDigest::from_record(prior))
    }
}

/// Build the cache for a reuse mode.
pub fn cache_for(mode: ReuseMode, db: FileDatabase) -> Arc<dyn DigestCache> {
    match mode {
        ReuseMode::Off => Arc::new(NoCache),
        ReuseMode::SamePath => Arc::new(PathMatchCache::new(&db)),
        ReuseMode::SameSize => Arc::new(SizeMatchCache::new(Arc::new(db))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashdex_core::{FileMode, RecordError};
    use std::time::{Duration, UNIX_EPOCH};

    fn rec(path: &str, size: u64, secs: u64, sha1: &str) -> FileRecord {
        let mut r = FileRecord::new(
            path,
            size,
            UNIX_EPOCH + Duration::from_secs(secs),
            FileMode::regular(0o644),
        );
        r.sha1 = sha1.to_string();
        r
    }

    #[test]
    fn test_covers() {
        let digest = CachedDigest {
            sha1: "aa".into(),
            md5: String::new(),
        };
        assert!(digest.covers(false));
        assert!(!digest.covers(true));
    }

    #[test]
    fn test_path_match_requires_same_size_and_mtime() {
        let db = FileDatabase::new(vec![rec("a", 5, 100, "h1")]);
        let cache = cache_for(ReuseMode::SamePath, db);

        assert_eq!(cache.lookup(&rec("a", 5, 100, "")).unwrap().sha1, "h1");
        assert!(cache.lookup(&rec("a", 6, 100, "")).is_none());
        assert!(cache.lookup(&rec("a", 5, 101, "")).is_none());
        assert!(cache.lookup(&rec("b", 5, 100, "")).is_none());
    }

    #[test]
    fn test_size_match_skips_unhashed_priors() {
        let mut failed = rec("bad", 5, 0, "");
        failed.error = Some(RecordError::Read {
            message: "boom".into(),
        });
        let db = FileDatabase::new(vec![failed, rec("x", 5, 0, "h2"), rec("y", 5, 0, "h3")]);
        let cache = cache_for(ReuseMode::SameSize, db);

        assert_eq!(cache.lookup(&rec("other", 5, 9, "")).unwrap().sha1, "h2");
        assert!(cache.lookup(&rec("other", 4, 9, "")).is_none());
    }

    #[test]
    fn test_off_and_closure() {
        let db = FileDatabase::new(vec![rec("a", 5, 100, "h1")]);
        assert!(cache_for(ReuseMode::Off, db).lookup(&rec("a", 5, 100, "")).is_none());

        let fixed = |r: &FileRecord| {
            (r.size == 3).then(|| CachedDigest {
                sha1: "fixed".into(),
                md5: String::new(),
            })
        };
        assert_eq!(fixed.lookup(&rec("z", 3, 0, "")).unwrap().sha1, "fixed");
    }
}
