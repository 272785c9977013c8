//! Parser for `sha1sum`/`md5sum`-style checksum listings.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hashdex_core::HashType;

use crate::error::ExternError;

static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-fA-F]+)\s+(.+)$").expect("Invalid checksum line regex"));

/// One entry of a foreign checksum listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecord {
    /// Lowercase hex digest.
    pub hash: String,
    pub path: String,
}

/// A parsed checksum listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalManifest {
    pub records: Vec<ExternalRecord>,
    /// Algorithm shared by every record; `None` when no line matched.
    pub hash_type: Option<HashType>,
}

impl ExternalManifest {
    /// Parse the listing at `path`.
    pub fn open(path: &Path) -> Result<Self, ExternError> {
        let file = File::open(path).map_err(|e| ExternError::io(path, e))?;
        Self::parse(BufReader::new(file), path)
    }

    /// Parse a listing from any reader; `label` names the source in errors.
    ///
    /// Either the whole listing parses with a single hash algorithm or an
    /// error is returned; no partial result is produced.
    pub fn parse<R: BufRead>(reader: R, label: &Path) -> Result<Self, ExternError> {
        let mut manifest = Self::default();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| ExternError::io(label, e))?;
            let line = line.trim_end_matches('\r');

            let Some(caps) = LINE_RE.captures(line) else {
                if !line.trim().is_empty() {
                    warn!(line = line_no, content = %line, "skipping unrecognized checksum line");
                }
                continue;
            };
            let hash = caps[1].to_ascii_lowercase();
            // binary-mode marker written by the checksum tools
            let path = caps[2].strip_prefix('*').unwrap_or(&caps[2]);

            let found = HashType::from_hex_len(hash.len()).ok_or(ExternError::UnknownHashLength {
                line: line_no,
                length: hash.len(),
            })?;
            match manifest.hash_type {
                None => manifest.hash_type = Some(found),
                Some(expected) if expected != found => {
                    return Err(ExternError::InconsistentHash {
                        line: line_no,
                        expected,
                        found,
                    });
                }
                Some(_) => {}
            }

            manifest.records.push(ExternalRecord {
                hash,
                path: path.to_string(),
            });
        }

        debug!(
            source = %label.display(),
            records = manifest.records.len(),
            hash_type = ?manifest.hash_type,
            "parsed external manifest"
        );
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExternalRecord> {
        self.records.iter()
    }
}
