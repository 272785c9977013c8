//! Analysis over finished hashdex manifests.
//!
//! - **External diff** - compare a local index with a `sha1sum`/`md5sum`
//!   listing produced elsewhere
//! - **Duplicate detection** - group indexed files by SHA-1
//!
//! # External Diff
//!
//! ```rust,no_run
//! use std::path::Path;
//! use hashdex_analyze::{ExternalManifest, extern_diff};
//! use hashdex_store::FileDatabase;
//!
//! let local = FileDatabase::open(Path::new("/data/hashdex.csv")).unwrap();
//! let remote = ExternalManifest::open(Path::new("backup.sha1")).unwrap();
//! let diff = extern_diff(&local, &remote);
//!
//! for path in &diff.local_only {
//!     println!("not backed up: {path}");
//! }
//! ```

mod diff;
mod duplicates;
mod error;
mod external;

pub use diff::{DiffPaths, diff_records, extern_diff};
pub use duplicates::{
    DuplicateConfig, DuplicateConfigBuilder, DuplicateFinder, DuplicateGroup, DuplicateReport,
};
pub use error::ExternError;
pub use external::{ExternalManifest, ExternalRecord};

// Re-export core types
pub use hashdex_core::HashType;
