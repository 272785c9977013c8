//! Hash worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use hashdex_core::{FileRecord, ScanError};

use crate::cache::DigestCache;
use crate::digest::FileHasher;
use crate::progress::ProgressReporter;

/// Fills in digests for one record at a time.
pub(crate) struct HashWorker {
    root: Arc<PathBuf>,
    hasher: FileHasher,
    cache: Arc<dyn DigestCache>,
    reporter: Arc<ProgressReporter>,
}

impl HashWorker {
    pub fn new(
        root: Arc<PathBuf>,
        hasher: FileHasher,
        cache: Arc<dyn DigestCache>,
        reporter: Arc<ProgressReporter>,
    ) -> Self {
        Self {
            root,
            hasher,
            cache,
            reporter,
        }
    }

    /// Hash records from `input` until it closes, forwarding each to `output`.
    pub fn run(&self, input: Receiver<FileRecord>, output: Sender<FileRecord>) {
        for mut record in input.iter() {
            let cache_hit = self.process(&mut record);
            self.reporter.record_hashed(cache_hit, record.error.is_some());
            if output.send(record).is_err() {
                warn!("manifest writer stopped receiving");
                break;
            }
        }
    }

    /// Returns whether the digests came from the cache.
    pub fn process(&self, record: &mut FileRecord) -> bool {
        if !record.is_hashable() {
            return false;
        }

        let need_md5 = self.hasher.computes_md5();
        if let Some(cached) = self.cache.lookup(record) {
            if cached.covers(need_md5) {
                trace!(path = %record.path, "digest reused");
                record.sha1 = cached.sha1;
                if need_md5 {
                    record.md5 = cached.md5;
                }
                return true;
            }
        }

        match self.hasher.hash_file(&record.full_path(&self.root)) {
            Ok(digests) => {
                record.sha1 = digests.sha1;
                record.md5 = digests.md5.unwrap_or_default();
            }
            Err(err) => {
                debug!(path = %record.path, error = %err, "hash failed");
                record.set_error(err);
            }
        }
        false
    }
}

/// A fixed set of named worker threads sharing one input channel.
pub(crate) struct HashPool {
    handles: Vec<JoinHandle<()>>,
}

impl HashPool {
    /// Spawn `count` workers built by `make`.
    ///
    /// Each thread gets its own clone of `output`; the original is dropped
    /// here, so the output channel closes when the last worker exits.
    pub fn spawn(
        count: usize,
        make: impl Fn() -> HashWorker,
        input: Receiver<FileRecord>,
        output: Sender<FileRecord>,
    ) -> Result<Self, ScanError> {
        let mut handles = Vec::with_capacity(count);
        for id in 0..count.max(1) {
            let worker = make();
            let input = input.clone();
            let output = output.clone();
            let name = format!("hash-{id}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker.run(input, output))
                .map_err(|e| ScanError::Thread {
                    name,
                    message: e.to_string(),
                })?;
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    /// Wait for every worker to finish.
    pub fn join(self) -> Result<(), ScanError> {
        let mut result = Ok(());
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("hash").to_string();
            if handle.join().is_err() && result.is_ok() {
                result = Err(ScanError::Thread {
                    name,
                    message: "worker panicked".to_string(),
                });
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedDigest, NoCache};
    use hashdex_core::{FileMode, RecordError};
    use std::fs;
    use std::time::UNIX_EPOCH;
    use tempfile::TempDir;

    fn worker(root: &std::path::Path, md5: bool, cache: Arc<dyn DigestCache>) -> HashWorker {
        HashWorker::new(
            Arc::new(root.to_path_buf()),
            FileHasher::new(md5, None),
            cache,
            Arc::new(ProgressReporter::new(1000)),
        )
    }

    fn rec(path: &str, size: u64) -> FileRecord {
        FileRecord::new(path, size, UNIX_EPOCH, FileMode::regular(0o644))
    }

    #[test]
    fn test_hashes_relative_to_root() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("f"), "hello world").unwrap();

        let mut record = rec("f", 11);
        assert!(!worker(temp.path(), true, Arc::new(NoCache)).process(&mut record));
        assert_eq!(record.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(record.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_cache_without_md5_is_not_enough() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("f"), "abc").unwrap();
        let cache = |_: &FileRecord| {
            Some(CachedDigest {
                sha1: "cached".to_string(),
                md5: String::new(),
            })
        };

        let mut record = rec("f", 3);
        assert!(worker(temp.path(), false, Arc::new(cache)).process(&mut record));
        assert_eq!(record.sha1, "cached");

        let mut record = rec("f", 3);
        assert!(!worker(temp.path(), true, Arc::new(cache)).process(&mut record));
        assert_eq!(record.sha1, "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_failed_records_pass_through() {
        let temp = TempDir::new().unwrap();
        let mut record = FileRecord::failed(
            "gone",
            RecordError::Stat {
                message: "denied".into(),
            },
        );
        worker(temp.path(), false, Arc::new(NoCache)).process(&mut record);
        assert!(record.sha1.is_empty());
        assert!(matches!(record.error, Some(RecordError::Stat { .. })));
    }

    #[test]
    fn test_open_failure_is_recorded() {
        let temp = TempDir::new().unwrap();
        let mut record = rec("missing", 0);
        worker(temp.path(), false, Arc::new(NoCache)).process(&mut record);
        assert!(matches!(record.error, Some(RecordError::Open { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_open_failure_kept_for_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        let native = std::path::PathBuf::from(OsStr::from_bytes(b"gone\xff"));
        let mut record = FileRecord::new(native, 0, UNIX_EPOCH, FileMode::regular(0o644));
        assert!(matches!(record.error, Some(RecordError::InvalidPath { .. })));

        worker(temp.path(), false, Arc::new(NoCache)).process(&mut record);
        assert!(record.sha1.is_empty());
        assert!(matches!(record.error, Some(RecordError::Open { .. })));
        assert_eq!(record.path, "gone\u{fffd}");
    }

    #[test]
    fn test_pool_forwards_every_record() {
        let temp = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(temp.path().join(format!("f{i}")), i.to_string()).unwrap();
        }

        let (in_tx, in_rx) = crossbeam_channel::bounded(0);
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        let root = temp.path().to_path_buf();
        let pool = HashPool::spawn(4, || worker(&root, false, Arc::new(NoCache)), in_rx, out_tx).unwrap();

        for i in 0..20 {
            in_tx.send(rec(&format!("f{i}"), 1)).unwrap();
        }
        drop(in_tx);
        pool.join().unwrap();

        let records: Vec<FileRecord> = out_rx.iter().collect();
        assert_eq!(records.len(), 20);
        assert!(records.iter().all(|r| r.sha1.len() == 40));
    }
}
