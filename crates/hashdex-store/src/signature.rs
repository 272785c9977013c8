//! Compact set of `(hash, size)` content signatures.
//!
//! Persisted as one `<hex-hash>-<size>` line per entry with no header, for
//! cheap "have I seen this content before" checks without a full manifest.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::thread;

use crossbeam_channel::Receiver;
use hashdex_core::FileRecord;
use indexmap::IndexSet;
use tracing::debug;

use crate::atomic::AtomicFile;
use crate::error::StoreError;
use crate::manifest::read_manifest;

/// A content signature: digest plus size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureEntry {
    pub hash: String,
    pub size: u64,
}

impl SignatureEntry {
    pub fn new(hash: impl Into<String>, size: u64) -> Self {
        Self {
            hash: hash.into(),
            size,
        }
    }

    /// Signature of a hashed record. Records without a SHA-1 have none.
    pub fn from_record(record: &FileRecord) -> Option<Self> {
        (!record.sha1.is_empty()).then(|| Self::new(record.sha1.clone(), record.size))
    }
}

impl fmt::Display for SignatureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hash, self.size)
    }
}

impl FromStr for SignatureEntry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 2 {
            return Err(format!("expected 2 fields, got {}", parts.len()));
        }
        let size = parts[1]
            .parse::<u64>()
            .map_err(|e| format!("bad size {:?}: {e}", parts[1]))?;
        Ok(Self::new(parts[0], size))
    }
}

/// Deduplicated set of content signatures with a derived set of sizes.
#[derive(Debug, Clone, Default)]
pub struct SignatureIndex {
    entries: IndexSet<SignatureEntry>,
    sizes: HashSet<u64>,
}

impl SignatureIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns `false` if it was already present.
    pub fn insert(&mut self, entry: SignatureEntry) -> bool {
        self.sizes.insert(entry.size);
        self.entries.insert(entry)
    }

    /// Drain hashed records until the channel closes. Returns entries added.
    pub fn extend_from_records(&mut self, source: &Receiver<FileRecord>) -> usize {
        let mut added = 0;
        let mut skipped = 0;
        for record in source.iter() {
            match SignatureEntry::from_record(&record) {
                Some(entry) => added += usize::from(self.insert(entry)),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped, "records without a digest left out of signature index");
        }
        added
    }

    /// Drain entries until the channel closes. Returns entries added.
    pub fn extend_from_entries(&mut self, source: &Receiver<SignatureEntry>) -> usize {
        source
            .iter()
            .map(|entry| usize::from(self.insert(entry)))
            .sum()
    }

    /// Whether any entry has this size.
    pub fn has_size(&self, size: u64) -> bool {
        self.sizes.contains(&size)
    }

    /// Whether this exact signature is present.
    pub fn contains(&self, entry: &SignatureEntry) -> bool {
        self.entries.contains(entry)
    }

    /// Number of distinct signatures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index holds no signatures.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the signatures.
    pub fn iter(&self) -> impl Iterator<Item = &SignatureEntry> {
        self.entries.iter()
    }

    /// Load an index file, adding its entries to this index.
    ///
    /// Any line that is not exactly `<hash>-<size>` fails the load.
    pub fn load(&mut self, path: &Path) -> Result<usize, StoreError> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let mut added = 0;
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| StoreError::io(path, e))?;
            let entry: SignatureEntry =
                line.parse().map_err(|_| StoreError::MalformedSignature {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    content: line.clone(),
                })?;
            added += usize::from(self.insert(entry));
        }
        Ok(added)
    }

    /// Read an index file into a new index.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut index = Self::new();
        index.load(path)?;
        Ok(index)
    }

    /// Build an index from the records of a manifest file.
    ///
    /// Records are fed through a channel from a reader thread, the same
    /// path a live pipeline would use.
    pub fn from_manifest(path: &Path) -> Result<Self, StoreError> {
        let records = read_manifest(path)?;
        let (tx, rx) = crossbeam_channel::bounded(1024);
        let feeder = thread::Builder::new()
            .name("signature-feed".to_string())
            .spawn(move || {
                for record in records {
                    if tx.send(record).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| StoreError::io(path, e))?;

        let mut index = Self::new();
        index.extend_from_records(&rx);
        feeder
            .join()
            .map_err(|_| StoreError::io(path, std::io::Error::other("signature feeder panicked")))?;
        Ok(index)
    }

    /// Write one line per entry.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for entry in &self.entries {
            writeln!(writer, "{entry}")?;
        }
        writer.flush()
    }

    /// Persist to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let atomic = AtomicFile::create(path)?;
        self.write_to(BufWriter::new(atomic.handle()?))
            .map_err(|e| StoreError::io(atomic.temp_path(), e))?;
        atomic.commit()?;
        Ok(())
    }
}

impl Extend<SignatureEntry> for SignatureIndex {
    fn extend<T: IntoIterator<Item = SignatureEntry>>(&mut self, iter: T) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

impl FromIterator<SignatureEntry> for SignatureIndex {
    fn from_iter<T: IntoIterator<Item = SignatureEntry>>(iter: T) -> Self {
        let mut index = Self::new();
        index.extend(iter);
        index
    }
}
