//! JWalk-based tree walker feeding the hash workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use crossbeam_channel::Sender;
use globset::GlobSet;
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use hashdex_core::{FileMode, FileRecord, IndexConfig, RecordError, ScanError};

use crate::progress::{IndexProgress, ProgressReporter};

/// Counts from one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Records sent downstream, including failed entries.
    pub files: u64,
    /// Sum of the sizes of those records.
    pub bytes: u64,
    /// Entries that could not be read and were sent as failed records.
    pub errors: u64,
    /// Regular files left out by the empty-file, ignore, or exclusion rules.
    pub skipped: u64,
}

/// Walks a directory tree and emits one [`FileRecord`] per regular file.
pub struct TreeWalker {
    include_hidden: bool,
    follow_symlinks: bool,
    skip_empty: bool,
    ignore: Arc<GlobSet>,
    excluded: Vec<PathBuf>,
    reporter: Arc<ProgressReporter>,
}

impl TreeWalker {
    /// Create a walker for the given configuration.
    pub fn new(config: &IndexConfig) -> Result<Self, ScanError> {
        Self::with_reporter(config, Arc::new(ProgressReporter::new(config.progress_interval)))
    }

    pub(crate) fn with_reporter(
        config: &IndexConfig,
        reporter: Arc<ProgressReporter>,
    ) -> Result<Self, ScanError> {
        Ok(Self {
            include_hidden: config.include_hidden,
            follow_symlinks: config.follow_symlinks,
            skip_empty: config.skip_empty,
            ignore: Arc::new(config.ignore_set()?),
            excluded: Vec::new(),
            reporter,
        })
    }

    /// Never emit this absolute path.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Subscribe to walk progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexProgress> {
        self.reporter.subscribe()
    }

    /// Canonicalize a root and check that it is a readable directory.
    pub fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
        let root_path = root.canonicalize().map_err(|e| ScanError::io(root, e))?;
        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }
        std::fs::read_dir(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        Ok(root_path)
    }

    /// Walk `root`, sending records on `output`.
    ///
    /// `output` is dropped on return, which closes the channel once every
    /// other sender is gone. Records carry paths relative to `root`.
    pub fn walk(&self, root: &Path, output: Sender<FileRecord>) -> Result<WalkSummary, ScanError> {
        let mut summary = WalkSummary::default();

        let ignore = Arc::clone(&self.ignore);
        let filter_root = root.to_path_buf();
        let walker = WalkDir::new(root)
            .parallelism(Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            })
            .skip_hidden(!self.include_hidden)
            .follow_links(self.follow_symlinks)
            .sort(true)
            .process_read_dir(move |_depth, _dir, _state, children| {
                if ignore.is_empty() {
                    return;
                }
                // Pruning here keeps ignored directories from being read at all.
                children.retain(|child| match child {
                    Ok(entry) => !is_ignored(&ignore, &filter_root, &entry.path()),
                    Err(_) => true,
                });
            });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| relative_to(root, p)).unwrap_or_default();
                    warn!(path = %path.display(), error = %err, "walk error");
                    summary.errors += 1;
                    self.emit(&output, FileRecord::failed(path, RecordError::stat(&err)), &mut summary)?;
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() || file_type.is_symlink() {
                continue;
            }

            let path = entry.path();
            if self.excluded.iter().any(|x| x == &path) {
                debug!(path = %path.display(), "excluded from walk");
                summary.skipped += 1;
                continue;
            }

            let relative = relative_to(root, &path);
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot stat");
                    summary.errors += 1;
                    self.emit(&output, FileRecord::failed(relative, RecordError::stat(&err)), &mut summary)?;
                    continue;
                }
            };

            // Sockets, fifos and devices are not content.
            if !metadata.is_file() {
                continue;
            }

            if self.skip_empty && metadata.len() == 0 {
                summary.skipped += 1;
                continue;
            }

            let record = FileRecord::new(
                relative,
                metadata.len(),
                metadata.modified().unwrap_or(UNIX_EPOCH),
                FileMode::from_metadata(&metadata),
            );
            self.emit(&output, record, &mut summary)?;
        }

        debug!(
            files = summary.files,
            errors = summary.errors,
            skipped = summary.skipped,
            "walk finished"
        );
        Ok(summary)
    }

    fn emit(
        &self,
        output: &Sender<FileRecord>,
        record: FileRecord,
        summary: &mut WalkSummary,
    ) -> Result<(), ScanError> {
        let size = record.size;
        let path = record.native_path.clone();
        output.send(record).map_err(|_| ScanError::Thread {
            name: "walker".to_string(),
            message: "hash workers stopped receiving".to_string(),
        })?;
        summary.files += 1;
        summary.bytes += size;
        self.reporter.record_walked(size, &path);
        Ok(())
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Match the entry name or its root-relative path against the ignore set.
fn is_ignored(ignore: &GlobSet, root: &Path, path: &Path) -> bool {
    let name_hit = path.file_name().is_some_and(|name| ignore.is_match(name));
    name_hit || ignore.is_match(relative_to(root, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn collect(walker: &TreeWalker, root: &Path) -> (Vec<FileRecord>, WalkSummary) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let summary = walker.walk(root, tx).unwrap();
        let mut records: Vec<FileRecord> = rx.iter().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        (records, summary)
    }

    fn paths(records: &[FileRecord]) -> Vec<&str> {
        records.iter().map(|r| r.path.as_str()).collect()
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sub/target")).unwrap();
        fs::write(temp.path().join("a.txt"), "hello").unwrap();
        fs::write(temp.path().join("empty"), "").unwrap();
        fs::write(temp.path().join(".hidden"), "x").unwrap();
        fs::write(temp.path().join("sub/b.log"), "abc").unwrap();
        fs::write(temp.path().join("sub/target/c.o"), "obj").unwrap();
        temp
    }

    #[test]
    fn test_walk_emits_regular_files() {
        let temp = fixture();
        let root = TreeWalker::resolve_root(temp.path()).unwrap();
        let walker = TreeWalker::new(&IndexConfig::new(&root)).unwrap();

        let (records, summary) = collect(&walker, &root);
        assert_eq!(
            paths(&records),
            vec![".hidden", "a.txt", "empty", "sub/b.log", "sub/target/c.o"]
        );
        assert_eq!(summary.files, 5);
        assert_eq!(summary.bytes, 12);
        assert!(records.iter().all(|r| r.sha1.is_empty() && r.error.is_none()));
    }

    #[test]
    fn test_skip_empty_and_hidden() {
        let temp = fixture();
        let root = TreeWalker::resolve_root(temp.path()).unwrap();
        let mut config = IndexConfig::new(&root);
        config.skip_empty = true;
        config.include_hidden = false;

        let (records, summary) = collect(&TreeWalker::new(&config).unwrap(), &root);
        assert_eq!(paths(&records), vec!["a.txt", "sub/b.log", "sub/target/c.o"]);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_ignore_patterns_prune_directories() {
        let temp = fixture();
        let root = TreeWalker::resolve_root(temp.path()).unwrap();
        let mut config = IndexConfig::new(&root);
        config.ignore_patterns = vec!["target".to_string(), "*.log".to_string()];

        let (records, _) = collect(&TreeWalker::new(&config).unwrap(), &root);
        assert_eq!(paths(&records), vec![".hidden", "a.txt", "empty"]);
    }

    #[test]
    fn test_excluded_path_is_skipped() {
        let temp = fixture();
        let root = TreeWalker::resolve_root(temp.path()).unwrap();
        let walker = TreeWalker::new(&IndexConfig::new(&root))
            .unwrap()
            .exclude(root.join("a.txt"));

        let (records, summary) = collect(&walker, &root);
        assert!(!paths(&records).contains(&"a.txt"));
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_resolve_root_rejects_file() {
        let temp = fixture();
        let err = TreeWalker::resolve_root(&temp.path().join("a.txt")).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory { .. }));

        let err = TreeWalker::resolve_root(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_root_rejects_unreadable_dir() {
        use std::os::unix::fs::PermissionsExt;

        let temp = fixture();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let readable = fs::read_dir(&locked).is_ok();

        let result = TreeWalker::resolve_root(&locked);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        // root ignores directory permissions
        if readable {
            return;
        }
        assert!(matches!(result, Err(ScanError::PermissionDenied { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed_by_default() {
        let temp = fixture();
        std::os::unix::fs::symlink(temp.path().join("a.txt"), temp.path().join("link")).unwrap();
        let root = TreeWalker::resolve_root(temp.path()).unwrap();

        let (records, _) = collect(&TreeWalker::new(&IndexConfig::new(&root)).unwrap(), &root);
        assert!(!paths(&records).contains(&"link"));
    }
}
