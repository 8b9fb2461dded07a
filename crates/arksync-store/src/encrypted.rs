//! Encrypted repository: every file is stored as a signed, encrypted container.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   files/<path>.enc   one container per repository path
//!   staging/           in-flight saves
//!   metadata.json      repository metadata (plaintext)
//! ```
//!
//! The index is rebuilt from the containers' signed plain metadata, so the
//! reported size and checksum always describe the plaintext. Containers
//! whose signature does not verify under the repository keyring make
//! `index` fail rather than silently disappearing.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ignore::WalkBuilder;

use arksync_core::{normalize_path, FileEntry, FileInfo, RepositoryIndex, RepositoryMetadata};
use arksync_crypto::{open_encrypted, read_plain_metadata, write_encrypted, CryptoError, FileKeyring, PlainMetadata};

use crate::error::{RepositoryError, Result};
use crate::staging::{
    blocking, prune_empty_dirs, read_metadata_file, relative_path, write_metadata_file,
    HashingReader, StagedFile,
};
use crate::traits::{FileStream, MetadataTransform, Repository};

/// Suffix appended to every stored container.
pub const CONTAINER_EXTENSION: &str = ".enc";

const FILES_DIR: &str = "files";
const STAGING_DIR: &str = "staging";
const METADATA_FILE: &str = "metadata.json";

/// Repository whose file bodies are encrypted at rest.
pub struct EncryptedRepository {
    root: PathBuf,
    keyring: Arc<FileKeyring>,
}

impl EncryptedRepository {
    /// Create the directory layout under `root` (if needed) and open.
    pub fn init(root: impl AsRef<Path>, keyring: Arc<FileKeyring>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(FILES_DIR))?;
        fs::create_dir_all(root.join(STAGING_DIR))?;
        let repo = Self::open(root, keyring)?;
        if !repo.metadata_path().exists() {
            write_metadata_file(&repo.metadata_path(), &RepositoryMetadata::default())?;
        }
        tracing::info!(root = %repo.root.display(), "initialized encrypted repository");
        Ok(repo)
    }

    /// Open an initialized encrypted repository.
    pub fn open(root: impl AsRef<Path>, keyring: Arc<FileKeyring>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.join(FILES_DIR).is_dir() {
            return Err(RepositoryError::NotInitialized(root.display().to_string()));
        }
        Ok(Self { root, keyring })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Normalize `path` and map it to its container location.
    fn container(&self, path: &str) -> Result<(String, PathBuf)> {
        let path = normalize_path(path)?;
        let abs = self.files_dir().join(format!("{path}{CONTAINER_EXTENSION}"));
        Ok((path, abs))
    }

    async fn existing_container(&self, path: &str) -> Result<(String, PathBuf)> {
        let (path, abs) = self.container(path)?;
        let probe = abs.clone();
        if blocking(move || Ok(probe.is_file())).await? {
            Ok((path, abs))
        } else {
            Err(RepositoryError::FileNotFound(path))
        }
    }
}

#[async_trait]
impl Repository for EncryptedRepository {
    async fn index(&self) -> Result<RepositoryIndex> {
        let files_dir = self.files_dir();
        let trusted = [self.keyring.signer()];
        let entries = blocking(move || {
            let walker = WalkBuilder::new(&files_dir).standard_filters(false).build();
            let mut entries = Vec::new();
            for entry in walker {
                let entry = entry.map_err(|e| {
                    RepositoryError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
                })?;
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let Some(stored) = relative_path(&files_dir, entry.path()) else {
                    continue;
                };
                let Some(path) = stored.strip_suffix(CONTAINER_EXTENSION) else {
                    tracing::warn!(path = %stored, "ignoring non-container file");
                    continue;
                };

                let file = BufReader::new(File::open(entry.path())?);
                let plain = read_plain_metadata(file, &trusted).map_err(|e| {
                    tracing::warn!(path = %path, error = %e, "container failed verification");
                    e
                })?;
                entries.push(FileEntry::new(path, plain.size, plain.checksum));
            }
            Ok(entries)
        })
        .await?;

        Ok(RepositoryIndex::new(entries)?)
    }

    async fn open(&self, path: &str) -> Result<(FileInfo, FileStream)> {
        let (_, abs) = self.existing_container(path).await?;
        let keyring = self.keyring.clone();
        blocking(move || {
            let file = BufReader::new(File::open(abs)?);
            let (plain, reader) = open_encrypted(file, &keyring)?;
            let info = FileInfo {
                length: plain.size,
                checksum: plain.checksum,
            };
            Ok((info, Box::new(reader) as FileStream))
        })
        .await
    }

    async fn save(&self, path: &str, info: &FileInfo, stream: FileStream) -> Result<()> {
        let (path, target) = self.container(path)?;
        let staging = self.root.join(STAGING_DIR);
        let keyring = self.keyring.clone();
        let info = *info;
        let display = path.clone();

        blocking(move || {
            if target.exists() {
                return Err(RepositoryError::DestinationExists(display));
            }
            let (staged, file) = StagedFile::create_in(&staging)?;
            let plain = PlainMetadata {
                size: info.length,
                checksum: info.checksum,
            };

            let mut reader = HashingReader::new(stream);
            let mut writer = BufWriter::new(file);
            let written = write_encrypted(&mut reader, &mut writer, &plain, &keyring);
            match written {
                // The streamed bytes decide which mismatch to report.
                Err(CryptoError::PlaintextMismatch(_)) => {
                    reader.verify(&display, &info)?;
                    return Err(RepositoryError::Crypto(CryptoError::PlaintextMismatch(
                        display,
                    )));
                }
                Err(e) => return Err(e.into()),
                Ok(_) => {}
            }
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|e| RepositoryError::Io(e.into_error()))?
                .sync_all()?;
            staged.persist(&target, &display)
        })
        .await?;

        tracing::debug!(path = %path, size = info.length, "saved encrypted file");
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let (from, from_abs) = self.existing_container(from).await?;
        let (to, to_abs) = self.container(to)?;
        let files_dir = self.files_dir();
        let dest = to.clone();

        blocking(move || {
            if to_abs.exists() {
                return Err(RepositoryError::DestinationExists(dest));
            }
            if let Some(parent) = to_abs.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&from_abs, &to_abs)?;
            prune_empty_dirs(&from_abs, &files_dir);
            Ok(())
        })
        .await?;

        tracing::debug!(from = %from, to = %to, "moved encrypted file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (path, abs) = self.existing_container(path).await?;
        let files_dir = self.files_dir();
        blocking(move || {
            fs::remove_file(&abs)?;
            prune_empty_dirs(&abs, &files_dir);
            Ok(())
        })
        .await?;

        tracing::debug!(path = %path, "deleted encrypted file");
        Ok(())
    }

    async fn metadata(&self) -> Result<RepositoryMetadata> {
        let path = self.metadata_path();
        blocking(move || read_metadata_file(&path)).await
    }

    async fn update_metadata(&self, transform: MetadataTransform) -> Result<RepositoryMetadata> {
        let path = self.metadata_path();
        blocking(move || {
            let updated = transform(read_metadata_file(&path)?);
            write_metadata_file(&path, &updated)?;
            Ok(updated)
        })
        .await
    }
}
