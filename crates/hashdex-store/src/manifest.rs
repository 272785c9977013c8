//! CSV manifest of an indexing run.
//!
//! One header row, then one row per file:
//!
//! ```text
//! path,modified,size,mode,sha1[,md5],error
//! docs/readme.md,1700000000,5,-rw-r--r--,aaf4c61d...,,
//! ```
//!
//! `modified` is integer epoch seconds, `mode` is the `ls`-style string and
//! the digests are lowercase hex or empty. Row order is whatever order the
//! hash workers finished in and carries no meaning.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;
use hashdex_core::{FileMode, FileRecord, RecordError};
use serde::Deserialize;
use tracing::debug;

use crate::atomic::AtomicFile;
use crate::error::StoreError;

const COLUMNS: [&str; 5] = ["path", "modified", "size", "mode", "sha1"];
const MD5_COLUMN: &str = "md5";
const ERROR_COLUMN: &str = "error";

/// Streams records into CSV rows.
pub struct ManifestWriter<W: Write> {
    writer: csv::Writer<W>,
    with_md5: bool,
    rows: u64,
    label: PathBuf,
}

impl<W: Write> ManifestWriter<W> {
    /// Create a writer and emit the header row.
    ///
    /// `label` names the destination in error messages.
    pub fn new(inner: W, with_md5: bool, label: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let label = label.into();
        let mut writer = csv::Writer::from_writer(inner);

        let mut header: Vec<&str> = COLUMNS.to_vec();
        if with_md5 {
            header.push(MD5_COLUMN);
        }
        header.push(ERROR_COLUMN);
        writer
            .write_record(&header)
            .map_err(|e| StoreError::csv(&label, e))?;

        Ok(Self {
            writer,
            with_md5,
            rows: 0,
            label,
        })
    }

    /// Write one record as a row.
    pub fn write_record(&mut self, record: &FileRecord) -> Result<(), StoreError> {
        let modified = record.modified_secs().to_string();
        let size = record.size.to_string();
        let mode = record.mode.to_string();
        let error = record
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        let mut row: Vec<&str> = vec![
            record.path.as_str(),
            modified.as_str(),
            size.as_str(),
            mode.as_str(),
            record.sha1.as_str(),
        ];
        if self.with_md5 {
            row.push(&record.md5);
        }
        row.push(&error);

        self.writer
            .write_record(&row)
            .map_err(|e| StoreError::csv(&self.label, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Write every record received until the channel is closed and drained.
    pub fn write_from(&mut self, records: &Receiver<FileRecord>) -> Result<u64, StoreError> {
        let before = self.rows;
        for record in records.iter() {
            self.write_record(&record)?;
        }
        Ok(self.rows - before)
    }

    /// Number of data rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush buffered rows and hand back the underlying writer.
    pub fn finish(self) -> Result<W, StoreError> {
        let label = self.label;
        self.writer.into_inner().map_err(|e| StoreError::Io {
            path: label,
            source: e.into_error(),
        })
    }
}

/// Write records to `path`, replacing any existing manifest atomically.
pub fn write_manifest(path: &Path, records: &[FileRecord], with_md5: bool) -> Result<(), StoreError> {
    let atomic = AtomicFile::create(path)?;
    let mut writer = ManifestWriter::new(BufWriter::new(atomic.handle()?), with_md5, path)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer
        .finish()?
        .flush()
        .map_err(|e| StoreError::io(path, e))?;
    atomic.commit()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ManifestRow {
    path: String,
    modified: i64,
    size: u64,
    mode: String,
    sha1: String,
    #[serde(default)]
    md5: String,
    error: String,
}

/// Read a manifest from disk.
///
/// A missing file yields [`StoreError::NotFound`]; any malformed row fails
/// the whole read.
pub fn read_manifest(path: &Path) -> Result<Vec<FileRecord>, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let records = read_manifest_from(BufReader::new(file), path)?;
    debug!(path = %path.display(), records = records.len(), "loaded manifest");
    Ok(records)
}

/// Read a manifest from any reader. `label` names the source in errors.
pub fn read_manifest_from<R: Read>(reader: R, label: &Path) -> Result<Vec<FileRecord>, StoreError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut records = Vec::new();

    for result in reader.deserialize::<ManifestRow>() {
        let row = result.map_err(|e| StoreError::csv(label, e))?;
        let line = records.len() as u64 + 2;
        records.push(row_to_record(row, label, line)?);
    }

    Ok(records)
}

fn row_to_record(row: ManifestRow, label: &Path, line: u64) -> Result<FileRecord, StoreError> {
    let mode: FileMode = row.mode.parse().map_err(|e| StoreError::MalformedRow {
        path: label.to_path_buf(),
        line,
        reason: format!("{e}"),
    })?;

    let mut record = FileRecord::new(
        PathBuf::from(&row.path),
        row.size,
        FileRecord::time_from_secs(row.modified),
        mode,
    );
    record.sha1 = row.sha1;
    record.md5 = row.md5;
    record.error = (!row.error.is_empty()).then(|| RecordError::Recorded(row.error));
    Ok(record)
}
