//! Filesystem repository: a working tree plus a committed SQLite index.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   .arksync/
//!     index.db        committed index
//!     metadata.json   repository metadata
//!     staging/        in-flight saves
//!   .arksyncignore    optional gitignore-style exclusions
//!   ...               working tree
//! ```
//!
//! Saves stream into `staging/`, are verified, then renamed into place and
//! recorded in the index. A failed save leaves neither a file nor an entry.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;

use arksync_core::{normalize_path, FileEntry, FileInfo, RepositoryIndex, RepositoryMetadata, Sha256Digest};

use crate::error::{RepositoryError, Result};
use crate::index_store::SqliteIndexStore;
use crate::matcher::PathMatcher;
use crate::staging::{
    blocking, prune_empty_dirs, read_metadata_file, relative_path, write_metadata_file,
    HashingReader, StagedFile,
};
use crate::traits::{FileStream, LocalRepository, MetadataTransform, Repository};

/// Control directory name under the repository root.
pub const CONTROL_DIR: &str = ".arksync";

/// Per-directory exclusion file honored by working-tree scans.
pub const IGNORE_FILE: &str = ".arksyncignore";

const INDEX_DB: &str = "index.db";
const METADATA_FILE: &str = "metadata.json";
const STAGING_DIR: &str = "staging";

/// Repository rooted at a local directory.
pub struct FilesystemRepository {
    root: PathBuf,
    control: PathBuf,
    index: SqliteIndexStore,
}

impl FilesystemRepository {
    /// Create the control directory under `root` (if needed) and open.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(CONTROL_DIR).join(STAGING_DIR))?;
        let repo = Self::open(root)?;
        if !repo.metadata_path().exists() {
            write_metadata_file(&repo.metadata_path(), &RepositoryMetadata::default())?;
        }
        tracing::info!(root = %repo.root.display(), "initialized repository");
        Ok(repo)
    }

    /// Open an initialized repository.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let control = root.join(CONTROL_DIR);
        if !control.is_dir() {
            return Err(RepositoryError::NotInitialized(root.display().to_string()));
        }
        fs::create_dir_all(control.join(STAGING_DIR))?;
        let index = SqliteIndexStore::open(control.join(INDEX_DB))?;
        Ok(Self {
            root,
            control,
            index,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self) -> PathBuf {
        self.control.join(METADATA_FILE)
    }

    fn staging_dir(&self) -> PathBuf {
        self.control.join(STAGING_DIR)
    }

    /// Normalize `path` and map it into the working tree.
    fn resolve(&self, path: &str) -> Result<(String, PathBuf)> {
        let path = normalize_path(path)?;
        if path == CONTROL_DIR || path.starts_with(&format!("{CONTROL_DIR}/")) {
            return Err(RepositoryError::InvalidPath(arksync_core::CoreError::InvalidPath {
                path,
                reason: "inside the control directory",
            }));
        }
        let abs = self.root.join(&path);
        Ok((path, abs))
    }

    /// Committed entry at `path` whose working-tree file still exists.
    async fn committed(&self, path: &str) -> Result<(FileEntry, PathBuf)> {
        let (path, abs) = self.resolve(path)?;
        let entry = self
            .index
            .get(&path)
            .await?
            .ok_or_else(|| RepositoryError::FileNotFound(path.clone()))?;
        let present = {
            let abs = abs.clone();
            blocking(move || Ok(abs.is_file())).await?
        };
        if !present {
            return Err(RepositoryError::FileNotFound(path));
        }
        Ok((entry, abs))
    }

    async fn occupied(&self, path: &str, abs: &Path) -> Result<bool> {
        if self.index.get(path).await?.is_some() {
            return Ok(true);
        }
        let abs = abs.to_path_buf();
        blocking(move || Ok(abs.exists())).await
    }
}

#[async_trait]
impl Repository for FilesystemRepository {
    async fn index(&self) -> Result<RepositoryIndex> {
        Ok(RepositoryIndex::new(self.index.all().await?)?)
    }

    async fn open(&self, path: &str) -> Result<(FileInfo, FileStream)> {
        let (entry, abs) = self.committed(path).await?;
        let file = blocking(move || Ok(File::open(abs)?)).await?;
        Ok((entry.info(), Box::new(file)))
    }

    async fn save(&self, path: &str, info: &FileInfo, stream: FileStream) -> Result<()> {
        let (path, abs) = self.resolve(path)?;
        if self.occupied(&path, &abs).await? {
            return Err(RepositoryError::DestinationExists(path));
        }

        let staging = self.staging_dir();
        let info = *info;
        let display = path.clone();
        let target = abs.clone();
        blocking(move || {
            let (staged, file) = StagedFile::create_in(&staging)?;
            let mut reader = HashingReader::new(stream);
            let mut writer = BufWriter::new(file);
            io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|e| RepositoryError::Io(e.into_error()))?
                .sync_all()?;
            reader.verify(&display, &info)?;
            staged.persist(&target, &display)
        })
        .await?;

        let entry = FileEntry::new(path.clone(), info.length, info.checksum);
        if let Err(e) = self.index.insert(entry).await {
            // Roll the published file back so the save stays all-or-nothing.
            let root = self.root.clone();
            blocking(move || {
                fs::remove_file(&abs)?;
                prune_empty_dirs(&abs, &root);
                Ok(())
            })
            .await?;
            return Err(e);
        }

        tracing::debug!(path = %path, size = info.length, "saved file");
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let (_, from_abs) = self.committed(from).await?;
        let from = normalize_path(from)?;
        let (to, to_abs) = self.resolve(to)?;
        if self.occupied(&to, &to_abs).await? {
            return Err(RepositoryError::DestinationExists(to));
        }

        {
            let (from_abs, to_abs, root) = (from_abs.clone(), to_abs.clone(), self.root.clone());
            blocking(move || {
                if let Some(parent) = to_abs.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::rename(&from_abs, &to_abs)?;
                prune_empty_dirs(&from_abs, &root);
                Ok(())
            })
            .await?;
        }

        if let Err(e) = self.index.rename(&from, &to).await {
            blocking(move || {
                if let Some(parent) = from_abs.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(fs::rename(&to_abs, &from_abs)?)
            })
            .await?;
            return Err(e);
        }

        tracing::debug!(from = %from, to = %to, "moved file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (entry, abs) = self.committed(path).await?;
        let root = self.root.clone();
        blocking(move || {
            fs::remove_file(&abs)?;
            prune_empty_dirs(&abs, &root);
            Ok(())
        })
        .await?;
        self.index.remove(&entry.path).await?;

        tracing::debug!(path = %entry.path, "deleted file");
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

    fn as_local(&self) -> Option<&dyn LocalRepository> {
        Some(self)
    }
}

#[async_trait]
impl LocalRepository for FilesystemRepository {
    async fn find_all_files(&self, globs: &[String]) -> Result<Vec<String>> {
        let matcher = PathMatcher::new(globs)?;
        let root = self.root.clone();
        blocking(move || {
            let walker = WalkBuilder::new(&root)
                .hidden(false)
                .parents(false)
                .ignore(false)
                .git_ignore(false)
                .git_global(false)
                .git_exclude(false)
                .add_custom_ignore_filename(IGNORE_FILE)
                .filter_entry(|entry| entry.file_name() != CONTROL_DIR)
                .build();

            let mut files = Vec::new();
            for entry in walker {
                let entry = entry.map_err(|e| {
                    RepositoryError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
                })?;
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                if entry.file_name() == IGNORE_FILE {
                    continue;
                }
                let Some(path) = relative_path(&root, entry.path()) else {
                    tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 path");
                    continue;
                };
                if matcher.is_match(&path) {
                    files.push(path);
                }
            }
            files.sort();
            Ok(files)
        })
        .await
    }

    async fn indexed_filenames(&self) -> Result<Vec<String>> {
        self.index.paths().await
    }

    async fn contains(&self, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        Ok(self.index.get(&path).await?.is_some())
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let (_, abs) = self.resolve(path)?;
        blocking(move || Ok(abs.is_file())).await
    }

    async fn indexed_checksum(&self, path: &str) -> Result<Sha256Digest> {
        let path = normalize_path(path)?;
        self.index
            .get(&path)
            .await?
            .map(|entry| entry.checksum)
            .ok_or(RepositoryError::FileNotFound(path))
    }

    async fn compute_checksum(&self, path: &str) -> Result<Sha256Digest> {
        let (path, abs) = self.resolve(path)?;
        blocking(move || match File::open(&abs) {
            Ok(file) => Ok(Sha256Digest::from_reader(file)?.0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RepositoryError::FileNotFound(path)),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn add(&self, path: &str) -> Result<()> {
        let (path, abs) = self.resolve(path)?;
        if self.index.get(&path).await?.is_some() {
            return Err(RepositoryError::DestinationExists(path));
        }
        let missing = path.clone();
        let (checksum, size) = blocking(move || match File::open(&abs) {
            Ok(file) => Ok(Sha256Digest::from_reader(file)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RepositoryError::FileNotFound(missing)),
            Err(e) => Err(e.into()),
        })
        .await?;
        self.index.insert(FileEntry::new(path, size, checksum)).await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        self.index.remove(&path).await
    }
}
