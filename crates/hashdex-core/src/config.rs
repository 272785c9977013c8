//! Index run configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ScanError;

/// File name of the manifest written into the root when no output is given.
pub const DEFAULT_MANIFEST_NAME: &str = "hashdex.csv";

/// Upper bound on hash workers, to limit open descriptors and disk contention.
pub const MAX_WORKERS: usize = 8;

/// How a previous manifest may stand in for hashing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ReuseMode {
    /// Always hash.
    #[default]
    Off,
    /// Reuse the digest of the same path when size and mtime second match.
    SamePath,
    /// Reuse the digest of any previous file with the same size.
    ///
    /// Unsound: two different files of equal size get the same digest. Only
    /// worth it for repeated runs over a tree known to be mostly unchanged.
    SameSize,
}

/// Configuration for an indexing run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct IndexConfig {
    /// Root path to index.
    pub root: PathBuf,

    /// Manifest output path (None = `<root>/hashdex.csv`).
    #[builder(default)]
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Number of hash workers (0 = auto-detect, capped at `MAX_WORKERS`).
    #[builder(default = "0")]
    #[serde(default)]
    pub workers: usize,

    /// Compute MD5 alongside SHA-1 in the same pass.
    #[builder(default = "false")]
    #[serde(default)]
    pub compute_md5: bool,

    /// Bound on how long opening a single file may take.
    #[builder(default = "Some(Duration::from_secs(10))")]
    #[serde(default = "default_open_timeout")]
    pub open_timeout: Option<Duration>,

    /// Digest reuse from a previous manifest.
    #[builder(default)]
    #[serde(default)]
    pub reuse: ReuseMode,

    /// Skip zero-length regular files.
    #[builder(default = "false")]
    #[serde(default)]
    pub skip_empty: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Glob patterns to ignore, matched against names and relative paths.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Walked files between progress snapshots.
    #[builder(default = "1000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_true() -> bool {
    true
}

fn default_open_timeout() -> Option<Duration> {
    Some(Duration::from_secs(10))
}

fn default_progress_interval() -> u64 {
    1000
}

impl IndexConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if let Some(ref patterns) = self.ignore_patterns {
            for pattern in patterns {
                Glob::new(pattern).map_err(|e| format!("Bad ignore pattern {pattern:?}: {e}"))?;
            }
        }
        Ok(())
    }
}

impl IndexConfig {
    /// Create a new config builder.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Create a simple config for indexing a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output: None,
            workers: 0,
            compute_md5: false,
            open_timeout: default_open_timeout(),
            reuse: ReuseMode::Off,
            skip_empty: false,
            include_hidden: true,
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
            progress_interval: default_progress_interval(),
        }
    }

    /// Resolved manifest path.
    pub fn manifest_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_manifest_path(&self.root))
    }

    /// Effective number of hash workers.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_WORKERS),
            n => n,
        }
    }

    /// Compile the ignore patterns.
    pub fn ignore_set(&self) -> Result<GlobSet, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
                message: format!("bad ignore pattern {pattern:?}: {e}"),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })
    }
}

/// Manifest location used when none is configured.
pub fn default_manifest_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_MANIFEST_NAME)
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
