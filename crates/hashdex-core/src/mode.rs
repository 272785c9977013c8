//! Permission and file-type bits, rendered the way `ls -l` shows them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const S_IFMT: u32 = 0o170000;
const S_IFSOCK: u32 = 0o140000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFBLK: u32 = 0o060000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFIFO: u32 = 0o010000;

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;
const S_ISVTX: u32 = 0o1000;

const TYPE_CHARS: [(u32, char); 7] = [
    (S_IFREG, '-'),
    (S_IFDIR, 'd'),
    (S_IFLNK, 'l'),
    (S_IFIFO, 'p'),
    (S_IFSOCK, 's'),
    (S_IFCHR, 'c'),
    (S_IFBLK, 'b'),
];

/// Raw `st_mode` bits of a file.
///
/// `Display` produces a ten character string such as `-rw-r--r--`, and
/// `FromStr` parses that string back to the same bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMode(pub u32);

impl FileMode {
    /// Mode of a plain regular file with the given permission bits.
    pub fn regular(perm: u32) -> Self {
        Self(S_IFREG | (perm & 0o7777))
    }

    /// Read the mode from filesystem metadata.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        Self(metadata.permissions().mode())
    }

    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let perm = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
        let kind = if metadata.is_dir() { S_IFDIR } else { S_IFREG };
        Self(kind | perm)
    }

    /// Permission bits including setuid, setgid and sticky.
    pub fn permissions(&self) -> u32 {
        self.0 & 0o7777
    }

    /// Check if this is a regular file.
    pub fn is_regular(&self) -> bool {
        self.0 & S_IFMT == S_IFREG
    }

    fn type_char(&self) -> char {
        let kind = self.0 & S_IFMT;
        TYPE_CHARS
            .iter()
            .find(|(bits, _)| *bits == kind)
            .map(|(_, c)| *c)
            .unwrap_or('?')
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        let mut out = String::with_capacity(10);
        out.push(self.type_char());

        for (shift, special, lower, upper) in [
            (6, S_ISUID, 's', 'S'),
            (3, S_ISGID, 's', 'S'),
            (0, S_ISVTX, 't', 'T'),
        ] {
            let bits = (m >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            let exec = bits & 0o1 != 0;
            out.push(match (m & special != 0, exec) {
                (true, true) => lower,
                (true, false) => upper,
                (false, true) => 'x',
                (false, false) => '-',
            });
        }

        f.write_str(&out)
    }
}

/// Error returned when a mode string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid mode string: {0:?}")]
pub struct ParseModeError(pub String);

impl FromStr for FileMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseModeError(s.to_string());
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 10 {
            return Err(err());
        }

        let kind = TYPE_CHARS
            .iter()
            .find(|(_, c)| *c == chars[0])
            .map(|(bits, _)| *bits)
            .ok_or_else(err)?;

        let mut mode = kind;
        for (i, (shift, special, lower, upper)) in [
            (6, S_ISUID, 's', 'S'),
            (3, S_ISGID, 's', 'S'),
            (0, S_ISVTX, 't', 'T'),
        ]
        .into_iter()
        .enumerate()
        {
            let triplet = &chars[1 + i * 3..4 + i * 3];
            let mut bits = 0;
            match triplet[0] {
                'r' => bits |= 0o4,
                '-' => {}
                _ => return Err(err()),
            }
            match triplet[1] {
                'w' => bits |= 0o2,
                '-' => {}
                _ => return Err(err()),
            }
            match triplet[2] {
                'x' => bits |= 0o1,
                '-' => {}
                c if c == lower => {
                    bits |= 0o1;
                    mode |= special;
                }
                c if c == upper => mode |= special,
                _ => return Err(err()),
            }
            mode |= bits << shift;
        }

        Ok(Self(mode))
    }
}
