//! Two-sided comparison of a local index against an external listing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hashdex_core::{FileRecord, HashType};
use hashdex_store::FileDatabase;

use crate::external::{ExternalManifest, ExternalRecord};

/// Paths whose content is present on only one side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPaths {
    /// Local paths whose digest appears nowhere in the external listing.
    pub local_only: Vec<String>,
    /// External paths whose digest appears nowhere locally.
    pub remote_only: Vec<String>,
}

impl DiffPaths {
    /// Check if both sides hold the same set of contents.
    pub fn is_empty(&self) -> bool {
        self.local_only.is_empty() && self.remote_only.is_empty()
    }
}

/// Compare a local database with an external listing.
///
/// The local digest of the listing's algorithm is used. A listing with no
/// entries has no algorithm; SHA-1 is assumed, which makes every local
/// path local-only.
pub fn extern_diff(local: &FileDatabase, remote: &ExternalManifest) -> DiffPaths {
    let hash_type = remote.hash_type.unwrap_or(HashType::Sha1);
    diff_records(local.iter().map(|r| r.as_ref()), &remote.records, hash_type)
}

/// Classify both sides by digest set membership, in input order.
///
/// Local records lacking a digest of `hash_type` (failed files, or MD5 never
/// computed) cannot match anything and are reported local-only.
pub fn diff_records<'a>(
    local: impl IntoIterator<Item = &'a FileRecord>,
    remote: &[ExternalRecord],
    hash_type: HashType,
) -> DiffPaths {
    let local: Vec<&FileRecord> = local.into_iter().collect();

    let local_set: HashSet<&str> = local.iter().filter_map(|r| r.digest(hash_type)).collect();
    let remote_set: HashSet<&str> = remote.iter().map(|r| r.hash.as_str()).collect();

    if local_set.is_empty() && !local.is_empty() {
        warn!(%hash_type, "no local record carries a digest of this type");
    }

    let local_only: Vec<String> = local
        .iter()
        .filter(|r| r.digest(hash_type).is_none_or(|d| !remote_set.contains(d)))
        .map(|r| r.path.clone())
        .collect();

    let remote_only: Vec<String> = remote
        .iter()
        .filter(|r| !local_set.contains(r.hash.as_str()))
        .map(|r| r.path.clone())
        .collect();

    debug!(
        local = local.len(),
        remote = remote.len(),
        local_only = local_only.len(),
        remote_only = remote_only.len(),
        "diff complete"
    );

    DiffPaths {
        local_only,
        remote_only,
    }
}
