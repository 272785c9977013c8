//! Indexing pipeline for hashdex.
//!
//! One walker thread enumerates regular files under a root, a pool of hash
//! workers fills in SHA-1 (and optionally MD5) digests, and one writer
//! thread streams the records into a CSV manifest.
//!
//! # Overview
//!
//! - **Parallel hashing** on named worker threads fed by a crossbeam channel
//! - **Bounded opens** so a stuck file cannot stall a worker forever
//! - **Digest reuse** from a previous manifest via [`DigestCache`]
//! - **Atomic output**: the manifest appears only once complete
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use hashdex_scan::{IndexConfig, IndexPipeline, load_prior};
//!
//! let config = IndexConfig::new("/data");
//! let prior = load_prior(&config.manifest_path());
//! let pipeline = IndexPipeline::new(config).with_database(prior);
//! let summary = pipeline.run().unwrap();
//!
//! println!("{} files -> {}", summary.records, summary.manifest.display());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use hashdex_scan::{IndexConfig, IndexPipeline};
//!
//! let pipeline = IndexPipeline::new(IndexConfig::new("/data"));
//! let mut progress_rx = pipeline.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("Hashed {} of {} files", progress.files_hashed, progress.files_walked);
//!     }
//! });
//! ```

mod cache;
mod digest;
mod pipeline;
mod progress;
mod walker;
mod worker;

pub use cache::{CachedDigest, DigestCache, NoCache, PathMatchCache, SizeMatchCache, cache_for};
pub use digest::{Digests, FileHasher, open_with_timeout};
pub use pipeline::{IndexPipeline, IndexSummary, load_prior};
pub use progress::IndexProgress;
pub use walker::{TreeWalker, WalkSummary};

// Re-export core types for convenience
pub use hashdex_core::{FileRecord, IndexConfig, RecordError, ReuseMode, ScanError};
