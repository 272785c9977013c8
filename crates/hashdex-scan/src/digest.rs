//! Single-pass SHA-1 / MD5 computation with a bounded open step.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use hashdex_core::RecordError;
use md5::Md5;
use sha1::{Digest, Sha1};
use tracing::warn;

const BUFFER_SIZE: usize = 64 * 1024;

/// Hex digests of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digests {
    pub sha1: String,
    pub md5: Option<String>,
}

/// Computes the digests a run asks for, reading each file once.
#[derive(Debug, Clone)]
pub struct FileHasher {
    compute_md5: bool,
    open_timeout: Option<Duration>,
}

impl FileHasher {
    pub fn new(compute_md5: bool, open_timeout: Option<Duration>) -> Self {
        Self {
            compute_md5,
            open_timeout,
        }
    }

    /// Whether MD5 is computed alongside SHA-1.
    pub fn computes_md5(&self) -> bool {
        self.compute_md5
    }

    /// Open and hash a file.
    pub fn hash_file(&self, path: &Path) -> Result<Digests, RecordError> {
        let file = match self.open_timeout {
            Some(timeout) => open_with_timeout(path, timeout)?,
            None => File::open(path).map_err(|e| RecordError::open(&e))?,
        };
        self.hash_reader(file).map_err(|e| RecordError::read(&e))
    }

    /// Stream a reader through every requested digest.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<Digests> {
        let mut sha1 = Sha1::new();
        let mut md5 = self.compute_md5.then(Md5::new);
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            sha1.update(&buffer[..n]);
            if let Some(md5) = md5.as_mut() {
                md5.update(&buffer[..n]);
            }
        }

        Ok(Digests {
            sha1: hex::encode(sha1.finalize()),
            md5: md5.map(|h| hex::encode(h.finalize())),
        })
    }
}

/// Open a file, giving up after `timeout`.
///
/// The open runs on a helper thread. On timeout that thread is abandoned;
/// it exits on its own if the open ever returns.
pub fn open_with_timeout(path: &Path, timeout: Duration) -> Result<File, RecordError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let owned: PathBuf = path.to_path_buf();

    thread::Builder::new()
        .name("open".to_string())
        .spawn(move || {
            let _ = tx.send(File::open(&owned));
        })
        .map_err(|e| RecordError::open(&e))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(file)) => Ok(file),
        Ok(Err(e)) => Err(RecordError::open(&e)),
        Err(RecvTimeoutError::Timeout) => {
            warn!(path = %path.display(), ?timeout, "open timed out");
            Err(RecordError::OpenTimeout { timeout })
        }
        Err(RecvTimeoutError::Disconnected) => Err(RecordError::Open {
            message: "opener thread exited without a result".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_known_digests() {
        let hasher = FileHasher::new(true, None);
        let digests = hasher.hash_reader(&b"hello"[..]).unwrap();
        assert_eq!(digests.sha1, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert_eq!(digests.md5.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
    }

    #[test]
    fn test_empty_input() {
        let hasher = FileHasher::new(true, None);
        let digests = hasher.hash_reader(io::empty()).unwrap();
        assert_eq!(digests.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(digests.md5.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[test]
    fn test_md5_only_when_requested() {
        let hasher = FileHasher::new(false, None);
        let digests = hasher.hash_reader(&b"abc"[..]).unwrap();
        assert_eq!(digests.sha1, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert!(digests.md5.is_none());
    }

    #[test]
    fn test_multi_buffer_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        let data = vec![b'x'; BUFFER_SIZE * 3 + 17];
        fs::write(&path, &data).unwrap();

        let hasher = FileHasher::new(true, Some(Duration::from_secs(5)));
        let from_file = hasher.hash_file(&path).unwrap();
        let from_memory = hasher.hash_reader(data.as_slice()).unwrap();
        assert_eq!(from_file, from_memory);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let temp = TempDir::new().unwrap();
        let hasher = FileHasher::new(false, Some(Duration::from_secs(5)));
        let err = hasher.hash_file(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, RecordError::Open { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_open_times_out() {
        let temp = TempDir::new().unwrap();
        let fifo = temp.path().join("pipe");
        let made = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !made {
            return;
        }

        let timeout = Duration::from_millis(200);
        let err = open_with_timeout(&fifo, timeout).unwrap_err();
        assert_eq!(err, RecordError::OpenTimeout { timeout });
    }
}
