//! Digest algorithms recognised in checksum listings.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Digest algorithm, inferred from the length of a hex digest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HashType {
    Md5,
    Sha1,
}

impl HashType {
    /// Infer the algorithm from a hex digest. Unrecognised lengths yield `None`.
    pub fn from_hex(hash: &str) -> Option<Self> {
        Self::from_hex_len(hash.len())
    }

    /// Infer the algorithm from a hex digest length.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            _ => None,
        }
    }

    /// Length of this digest in hex characters.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
        }
    }
}
