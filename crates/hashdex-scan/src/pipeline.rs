//! Walk → hash → write orchestration.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use hashdex_core::{IndexConfig, ScanError};
use hashdex_store::{AtomicFile, FileDatabase, ManifestWriter, StoreError};

use crate::cache::{DigestCache, NoCache, cache_for};
use crate::digest::FileHasher;
use crate::progress::{IndexProgress, ProgressReporter};
use crate::walker::TreeWalker;
use crate::worker::{HashPool, HashWorker};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    /// Where the manifest was committed.
    pub manifest: PathBuf,
    /// Canonical root that was walked.
    pub root: PathBuf,
    /// Rows written to the manifest.
    pub records: u64,
    /// Total size of the indexed files.
    pub bytes: u64,
    /// Records whose digest was reused.
    pub cache_hits: u64,
    /// Records carrying a per-file error.
    pub errors: u64,
    /// Wall time of the run.
    pub duration: Duration,
}

/// Indexes one tree into a manifest.
///
/// The walker runs on the calling thread, hash workers on a pool of named
/// threads, and a single writer thread owns the output file. The manifest
/// is written to a private temporary file and renamed into place only after
/// every worker has exited and the writer has drained the channel. A failed
/// run leaves any existing manifest untouched.
///
/// A pipeline can be run more than once; counters and elapsed time restart
/// with each run. Runs on one pipeline must not overlap.
pub struct IndexPipeline {
    config: IndexConfig,
    cache: Arc<dyn DigestCache>,
    reporter: Arc<ProgressReporter>,
}

impl IndexPipeline {
    /// Create a pipeline that hashes every file.
    pub fn new(config: IndexConfig) -> Self {
        let reporter = Arc::new(ProgressReporter::new(config.progress_interval));
        Self {
            config,
            cache: Arc::new(NoCache),
            reporter,
        }
    }

    /// Use a custom digest cache.
    pub fn with_cache(mut self, cache: Arc<dyn DigestCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Reuse digests from `db` according to the configured reuse mode.
    pub fn with_database(self, db: FileDatabase) -> Self {
        let cache = cache_for(self.config.reuse, db);
        self.with_cache(cache)
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexProgress> {
        self.reporter.subscribe()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Run the pipeline to completion.
    pub fn run(&self) -> Result<IndexSummary, ScanError> {
        self.reporter.reset();
        let root = TreeWalker::resolve_root(&self.config.root)?;
        let target = resolve_output(&self.config, &root)?;

        let atomic = AtomicFile::create(&target).map_err(|e| ScanError::TempFile {
            dir: target.parent().map(Path::to_path_buf).unwrap_or_default(),
            source: store_io(e),
        })?;
        let file = atomic.handle().map_err(|e| ScanError::TempFile {
            dir: atomic.temp_path().to_path_buf(),
            source: store_io(e),
        })?;

        let walker = TreeWalker::with_reporter(&self.config, Arc::clone(&self.reporter))?
            .exclude(target.clone())
            .exclude(atomic.temp_path().to_path_buf());

        let workers = self.config.worker_count();
        info!(
            root = %root.display(),
            manifest = %target.display(),
            workers,
            md5 = self.config.compute_md5,
            reuse = %self.config.reuse,
            "indexing"
        );

        let (walk_tx, walk_rx) = crossbeam_channel::bounded(0);
        let (hash_tx, hash_rx) = crossbeam_channel::bounded(0);

        let with_md5 = self.config.compute_md5;
        let label = atomic.temp_path().to_path_buf();
        let writer = thread::Builder::new()
            .name("manifest-writer".to_string())
            .spawn(move || -> Result<u64, StoreError> {
                let mut writer = ManifestWriter::new(BufWriter::new(file), with_md5, &label)?;
                let rows = writer.write_from(&hash_rx)?;
                let mut out = writer.finish()?;
                out.flush().map_err(|e| StoreError::io(&label, e))?;
                Ok(rows)
            })
            .map_err(|e| ScanError::Thread {
                name: "manifest-writer".to_string(),
                message: e.to_string(),
            })?;

        let shared_root = Arc::new(root.clone());
        let hasher = FileHasher::new(self.config.compute_md5, self.config.open_timeout);
        let pool = HashPool::spawn(
            workers,
            || {
                HashWorker::new(
                    Arc::clone(&shared_root),
                    hasher.clone(),
                    Arc::clone(&self.cache),
                    Arc::clone(&self.reporter),
                )
            },
            walk_rx,
            hash_tx,
        )?;

        let walked = walker.walk(&root, walk_tx);
        let pooled = pool.join();
        let written = writer.join().map_err(|_| ScanError::Thread {
            name: "manifest-writer".to_string(),
            message: "writer panicked".to_string(),
        })?;

        // A writer failure surfaces downstream as a closed channel; report the cause.
        let rows = written.map_err(|e| ScanError::Writer {
            message: e.to_string(),
        })?;
        let walked = walked?;
        pooled?;

        let manifest = atomic.commit().map_err(|e| ScanError::Persist {
            path: target.clone(),
            source: store_io(e),
        })?;

        let progress = self.reporter.publish();
        if rows != walked.files {
            warn!(rows, walked = walked.files, "manifest row count differs from walk");
        }
        info!(
            records = rows,
            errors = progress.errors_count,
            cache_hits = progress.cache_hits,
            elapsed = ?progress.elapsed,
            "index complete"
        );

        Ok(IndexSummary {
            manifest,
            root,
            records: rows,
            bytes: walked.bytes,
            cache_hits: progress.cache_hits,
            errors: progress.errors_count,
            duration: progress.elapsed,
        })
    }
}

/// Load the manifest of a previous run for digest reuse.
///
/// Never fails: an absent manifest gives an empty database silently, any
/// other problem is logged and also gives an empty database.
pub fn load_prior(path: &Path) -> FileDatabase {
    match FileDatabase::open(path) {
        Ok(db) => {
            debug!(path = %path.display(), records = db.len(), "loaded prior manifest");
            db
        }
        Err(e) if e.is_not_found() => FileDatabase::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable prior manifest");
            FileDatabase::default()
        }
    }
}

/// Output path with a canonical parent, so the walker can recognize it.
fn resolve_output(config: &IndexConfig, root: &Path) -> Result<PathBuf, ScanError> {
    let target = match &config.output {
        Some(path) => path.clone(),
        None => hashdex_core::default_manifest_path(root),
    };
    let Some(name) = target.file_name() else {
        return Err(ScanError::InvalidConfig {
            message: format!("output path has no file name: {}", target.display()),
        });
    };
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let parent = parent.canonicalize().map_err(|e| ScanError::io(&parent, e))?;
    Ok(parent.join(name))
}

fn store_io(err: StoreError) -> std::io::Error {
    match err {
        StoreError::Io { source, .. } => source,
        other => std::io::Error::other(other.to_string()),
    }
}
