//! Persisted artifacts for hashdex.
//!
//! - **Manifest**: CSV record of one indexing run, written row by row from a
//!   channel and read back into [`FileRecord`]s
//! - **Signature index**: compact `<hash>-<size>` lines for presence checks
//! - **File database**: previous run's records, queried by size or digest
//!
//! Output files are written to a temporary sibling and renamed into place,
//! so readers never see a half-written file.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use hashdex_store::{FileDatabase, StoreError};
//!
//! let db = match FileDatabase::open(Path::new("/data/hashdex.csv")) {
//!     Ok(db) => db,
//!     Err(StoreError::NotFound { .. }) => FileDatabase::default(),
//!     Err(e) => panic!("{e}"),
//! };
//! println!("{} known files", db.len());
//! ```

mod atomic;
mod database;
mod error;
mod manifest;
mod signature;

pub use atomic::AtomicFile;
pub use database::FileDatabase;
pub use error::StoreError;
pub use manifest::{ManifestWriter, read_manifest, read_manifest_from, write_manifest};
pub use signature::{SignatureEntry, SignatureIndex};

// Re-export core types for convenience
pub use hashdex_core::{FileMode, FileRecord, HashType, RecordError};
