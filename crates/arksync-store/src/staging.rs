//! Shared plumbing for on-disk backends: staged writes, hashing readers,
//! and the metadata document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use arksync_core::{FileInfo, RepositoryMetadata, Sha256Digest, Sha256Hasher};

use crate::error::{RepositoryError, Result};

/// Run blocking filesystem work off the async executor.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

// ─────────────────────────────────────────────────────────────────────────────
// Staged files
// ─────────────────────────────────────────────────────────────────────────────

/// A file being written under a staging directory.
///
/// Removed on drop unless [`StagedFile::persist`] moved it into place.
pub(crate) struct StagedFile {
    path: PathBuf,
    persisted: bool,
}

impl StagedFile {
    /// Create a fresh, uniquely named file in `dir`.
    pub(crate) fn create_in(dir: &Path) -> Result<(Self, File)> {
        fs::create_dir_all(dir)?;
        loop {
            let name = format!("{}.partial", hex::encode(rand::random::<[u8; 8]>()));
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok((
                        Self {
                            path,
                            persisted: false,
                        },
                        file,
                    ))
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Move the staged file to `target`, refusing to replace anything.
    ///
    /// `display` names the destination in errors.
    pub(crate) fn persist(mut self, target: &Path, display: &str) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if target.exists() {
            return Err(RepositoryError::DestinationExists(display.to_string()));
        }
        fs::rename(&self.path, target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.persisted {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to clean up staged file");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hashing reader
// ─────────────────────────────────────────────────────────────────────────────

/// Pass-through reader that hashes what it yields.
pub(crate) struct HashingReader<R> {
    inner: R,
    hasher: Sha256Hasher,
}

impl<R: Read> HashingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256Hasher::new(),
        }
    }

    /// Compare what was read against `info`.
    pub(crate) fn verify(self, path: &str, info: &FileInfo) -> Result<()> {
        let actual_len = self.hasher.length();
        if actual_len != info.length {
            return Err(RepositoryError::LengthMismatch {
                path: path.to_string(),
                expected: info.length,
                actual: actual_len,
            });
        }
        let actual: Sha256Digest = self.hasher.finalize();
        if actual != info.checksum {
            return Err(RepositoryError::ChecksumMismatch {
                path: path.to_string(),
                expected: info.checksum,
                actual,
            });
        }
        Ok(())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata document
// ─────────────────────────────────────────────────────────────────────────────

/// Load `metadata.json`, or defaults if it does not exist yet.
pub(crate) fn read_metadata_file(path: &Path) -> Result<RepositoryMetadata> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RepositoryMetadata::default()),
        Err(e) => Err(e.into()),
    }
}

/// Replace `metadata.json` via a sibling temp file and rename.
pub(crate) fn write_metadata_file(path: &Path, metadata: &RepositoryMetadata) -> Result<()> {
    let json = serde_json::to_vec_pretty(metadata)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Repository path of `abs` below `root`, with `/` separators.
pub(crate) fn relative_path(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Remove now-empty directories between `start` and `stop` (exclusive).
pub(crate) fn prune_empty_dirs(start: &Path, stop: &Path) {
    let mut dir = start.parent();
    while let Some(current) = dir {
        if current == stop || !current.starts_with(stop) {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_staged_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let (staged, mut file) = StagedFile::create_in(dir.path()).unwrap();
            file.write_all(b"abc").unwrap();
            staged.path.clone()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_file_persist_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/file.txt");

        let (staged, _) = StagedFile::create_in(&dir.path().join("staging")).unwrap();
        staged.persist(&target, "file.txt").unwrap();
        assert!(target.exists());

        let (staged, _) = StagedFile::create_in(&dir.path().join("staging")).unwrap();
        let err = staged.persist(&target, "file.txt").unwrap_err();
        assert!(matches!(err, RepositoryError::DestinationExists(_)));
        assert_eq!(fs::read_dir(dir.path().join("staging")).unwrap().count(), 0);
    }

    #[test]
    fn test_hashing_reader_verify() {
        let mut reader = HashingReader::new(&b"hello"[..]);
        io::copy(&mut reader, &mut io::sink()).unwrap();
        reader.verify("x", &FileInfo::for_contents(b"hello")).unwrap();

        let mut reader = HashingReader::new(&b"hello"[..]);
        io::copy(&mut reader, &mut io::sink()).unwrap();
        assert!(matches!(
            reader.verify("x", &FileInfo::for_contents(b"HELLO")),
            Err(RepositoryError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_metadata_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        assert_eq!(read_metadata_file(&path).unwrap(), RepositoryMetadata::default());

        let meta = RepositoryMetadata::default().with_display_name("photos");
        write_metadata_file(&path, &meta).unwrap();
        assert_eq!(read_metadata_file(&path).unwrap(), meta);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/repo");
        assert_eq!(
            relative_path(root, Path::new("/repo/a/b.txt")).as_deref(),
            Some("a/b.txt")
        );
        assert_eq!(relative_path(root, Path::new("/repo")), None);
        assert_eq!(relative_path(root, Path::new("/other/x")), None);
    }
}
