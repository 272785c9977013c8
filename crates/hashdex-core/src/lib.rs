//! Core types for hashdex.
//!
//! This crate provides the data structures shared by the indexing pipeline,
//! the persisted stores and the analysis tools: file records, mode bits,
//! digest types, error types and run configuration.

mod config;
mod error;
mod hash_type;
mod mode;
mod record;

pub use config::{
    DEFAULT_MANIFEST_NAME, IndexConfig, IndexConfigBuilder, MAX_WORKERS, ReuseMode,
    default_manifest_path,
};
pub use error::{RecordError, ScanError};
pub use hash_type::HashType;
pub use mode::{FileMode, ParseModeError};
pub use record::FileRecord;
