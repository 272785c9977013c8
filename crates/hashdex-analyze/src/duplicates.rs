//! Duplicate content report over an indexed manifest.
//!
//! Records are grouped by SHA-1 and size; digests were already computed
//! during indexing, so no file is read here.

use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hashdex_store::FileDatabase;

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DuplicateConfig {
    /// Minimum file size to consider.
    #[builder(default = "1")]
    pub min_size: u64,

    /// Maximum file size to consider.
    #[builder(default = "u64::MAX")]
    pub max_size: u64,

    /// Maximum number of groups to return (0 = unlimited).
    #[builder(default = "0")]
    pub max_groups: usize,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: u64::MAX,
            max_groups: 0,
        }
    }
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }
}

/// Files sharing the same content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// SHA-1 shared by every file in the group.
    pub hash: String,

    /// Size of each file in bytes.
    pub size: u64,

    /// Root-relative paths, sorted.
    pub paths: Vec<String>,

    /// Wasted space: size * (count - 1).
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// Copies that could be removed while keeping one.
    pub fn deletable_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

/// Results from duplicate analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups sorted by wasted space descending.
    pub groups: Vec<DuplicateGroup>,

    /// Total wasted space across the returned groups.
    pub total_wasted_space: u64,

    /// Records that passed the size filter and carried a digest.
    pub files_analyzed: u64,

    /// Files that belong to a returned group.
    pub files_with_duplicates: u64,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// Duplicate finder over a [`FileDatabase`].
#[derive(Debug, Clone, Default)]
pub struct DuplicateFinder {
    config: DuplicateConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new duplicate finder with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Group the records of `db` by content.
    pub fn find_duplicates(&self, db: &FileDatabase) -> DuplicateReport {
        let candidates: Vec<_> = db
            .iter()
            .filter(|r| !r.sha1.is_empty() && r.error.is_none())
            .filter(|r| r.size >= self.config.min_size && r.size <= self.config.max_size)
            .collect();
        let files_analyzed = candidates.len() as u64;

        let mut groups: Vec<DuplicateGroup> = candidates
            .into_iter()
            .into_group_map_by(|r| (r.sha1.clone(), r.size))
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|((hash, size), members)| {
                let paths: Vec<String> = members.iter().map(|r| r.path.clone()).sorted().collect();
                let wasted_bytes = size * (paths.len() as u64 - 1);
                DuplicateGroup {
                    hash,
                    size,
                    paths,
                    wasted_bytes,
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            b.wasted_bytes
                .cmp(&a.wasted_bytes)
                .then_with(|| a.hash.cmp(&b.hash))
        });

        if self.config.max_groups > 0 && groups.len() > self.config.max_groups {
            groups.truncate(self.config.max_groups);
        }

        let total_wasted_space = groups.iter().map(|g| g.wasted_bytes).sum();
        let files_with_duplicates = groups.iter().map(|g| g.paths.len() as u64).sum();
        debug!(groups = groups.len(), files_analyzed, "duplicate scan complete");

        DuplicateReport {
            groups,
            total_wasted_space,
            files_analyzed,
            files_with_duplicates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashdex_core::{FileMode, FileRecord, RecordError};
    use std::time::UNIX_EPOCH;

    fn rec(path: &str, size: u64, sha1: &str) -> FileRecord {
        let mut r = FileRecord::new(path, size, UNIX_EPOCH, FileMode::regular(0o644));
        r.sha1 = sha1.to_string();
        r
    }

    #[test]
    fn test_groups_sorted_by_wasted_space() {
        let db = FileDatabase::new(vec![
            rec("small/a", 10, "h1"),
            rec("small/b", 10, "h1"),
            rec("small/c", 10, "h1"),
            rec("big/x", 100, "h2"),
            rec("big/y", 100, "h2"),
            rec("unique", 100, "h3"),
        ]);

        let report = DuplicateFinder::new().find_duplicates(&db);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].hash, "h2");
        assert_eq!(report.groups[0].wasted_bytes, 100);
        assert_eq!(report.groups[1].paths, vec!["small/a", "small/b", "small/c"]);
        assert_eq!(report.groups[1].wasted_bytes, 20);
        assert_eq!(report.total_wasted_space, 120);
        assert_eq!(report.files_with_duplicates, 5);
    }

    #[test]
    fn test_unhashed_and_small_files_ignored() {
        let mut failed = rec("failed", 50, "");
        failed.error = Some(RecordError::Read {
            message: "io".into(),
        });
        let db = FileDatabase::new(vec![
            failed,
            rec("failed2", 50, ""),
            rec("empty1", 0, "da39"),
            rec("empty2", 0, "da39"),
        ]);

        let report = DuplicateFinder::new().find_duplicates(&db);
        assert!(!report.has_duplicates());
        assert_eq!(report.files_analyzed, 0);
    }

    #[test]
    fn test_max_groups() {
        let db = FileDatabase::new(vec![
            rec("a1", 1, "a"),
            rec("a2", 1, "a"),
            rec("b1", 2, "b"),
            rec("b2", 2, "b"),
        ]);
        let config = DuplicateConfig::builder().max_groups(1usize).build().unwrap();
        let report = DuplicateFinder::with_config(config).find_duplicates(&db);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].hash, "b");
    }
}
