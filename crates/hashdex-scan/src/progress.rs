//! Index progress reporting.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// Progress information during an indexing run.
#[derive(Debug, Clone)]
pub struct IndexProgress {
    /// Regular files emitted by the walker so far.
    pub files_walked: u64,
    /// Total size of those files.
    pub bytes_walked: u64,
    /// Records that have left a hash worker.
    pub files_hashed: u64,
    /// Records whose digest came from the reuse cache.
    pub cache_hits: u64,
    /// Records carrying a per-file error.
    pub errors_count: u64,
    /// Most recently walked path, relative to the root.
    pub current_path: PathBuf,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
}

impl IndexProgress {
    /// Calculate walk rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_walked as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Records walked but not yet through a hash worker.
    pub fn in_flight(&self) -> u64 {
        self.files_walked.saturating_sub(self.files_hashed)
    }
}

/// Shared counters for one run, with periodic snapshots on a broadcast channel.
///
/// The walker and every hash worker hold a reference; sends with no
/// subscriber are dropped. [`reset`](Self::reset) starts a new run on the
/// same channel.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    start: Mutex<Instant>,
    interval: u64,
    files_walked: AtomicU64,
    bytes_walked: AtomicU64,
    files_hashed: AtomicU64,
    cache_hits: AtomicU64,
    errors_count: AtomicU64,
    current_path: Mutex<PathBuf>,
    tx: broadcast::Sender<IndexProgress>,
}

impl ProgressReporter {
    pub fn new(interval: u64) -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            start: Mutex::new(Instant::now()),
            interval: interval.max(1),
            files_walked: AtomicU64::new(0),
            bytes_walked: AtomicU64::new(0),
            files_hashed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
            current_path: Mutex::new(PathBuf::new()),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexProgress> {
        self.tx.subscribe()
    }

    /// Zero the counters and restart the clock; subscribers stay attached.
    pub fn reset(&self) {
        for counter in [
            &self.files_walked,
            &self.bytes_walked,
            &self.files_hashed,
            &self.cache_hits,
            &self.errors_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut current) = self.current_path.lock() {
            current.clear();
        }
        if let Ok(mut start) = self.start.lock() {
            *start = Instant::now();
        }
    }

    /// Count a walked file; every `interval` files a snapshot is broadcast.
    pub fn record_walked(&self, size: u64, path: &Path) {
        self.bytes_walked.fetch_add(size, Ordering::Relaxed);
        let count = self.files_walked.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.interval == 0 {
            if let Ok(mut current) = self.current_path.lock() {
                *current = path.to_path_buf();
            }
            self.publish();
        }
    }

    /// Count a record leaving a hash worker.
    pub fn record_hashed(&self, cache_hit: bool, failed: bool) {
        self.files_hashed.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        if failed {
            self.errors_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> IndexProgress {
        IndexProgress {
            files_walked: self.files_walked.load(Ordering::Relaxed),
            bytes_walked: self.bytes_walked.load(Ordering::Relaxed),
            files_hashed: self.files_hashed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            errors_count: self.errors_count.load(Ordering::Relaxed),
            current_path: self
                .current_path
                .lock()
                .map(|p| p.clone())
                .unwrap_or_default(),
            elapsed: self
                .start
                .lock()
                .map(|start| start.elapsed())
                .unwrap_or_default(),
        }
    }

    /// Broadcast the current snapshot.
    pub fn publish(&self) -> IndexProgress {
        let snapshot = self.snapshot();
        let _ = self.tx.send(snapshot.clone());
        snapshot
    }
}
