//! In-memory repositories.
//!
//! These are primarily for testing. They follow the same contract as the
//! filesystem backends but keep everything in memory with no persistence.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use arksync_core::{
    normalize_path, FileEntry, FileInfo, RepositoryIndex, RepositoryMetadata, Sha256Digest,
};

use crate::error::{RepositoryError, Result};
use crate::matcher::PathMatcher;
use crate::traits::{read_stream, FileStream, LocalRepository, MetadataTransform, Repository};

/// Check streamed bytes against a declared file info.
pub(crate) fn verify_contents(path: &str, info: &FileInfo, contents: &[u8]) -> Result<()> {
    let actual_len = contents.len() as u64;
    if actual_len != info.length {
        return Err(RepositoryError::LengthMismatch {
            path: path.to_string(),
            expected: info.length,
            actual: actual_len,
        });
    }
    let actual = Sha256Digest::hash(contents);
    if actual != info.checksum {
        return Err(RepositoryError::ChecksumMismatch {
            path: path.to_string(),
            expected: info.checksum,
            actual,
        });
    }
    Ok(())
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> RepositoryError {
    RepositoryError::Background(format!("lock poisoned: {e}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryRepository
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory repository without a working tree.
///
/// Thread-safe via RwLock.
pub struct MemoryRepository {
    inner: RwLock<MemoryRepositoryInner>,
}

#[derive(Default)]
struct MemoryRepositoryInner {
    contents: BTreeMap<String, Bytes>,
    metadata: RepositoryMetadata,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::with_contents(Vec::<(String, Vec<u8>)>::new())
    }

    /// Create a repository holding `files`.
    pub fn with_contents<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: AsRef<str>,
        C: Into<Bytes>,
    {
        let contents = files
            .into_iter()
            .map(|(path, contents)| (path.as_ref().to_string(), contents.into()))
            .collect();

        Self {
            inner: RwLock::new(MemoryRepositoryInner {
                contents,
                metadata: RepositoryMetadata::default(),
            }),
        }
    }

    pub fn with_metadata(self, metadata: RepositoryMetadata) -> Self {
        let mut inner = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        inner.metadata = metadata;
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Snapshot of every stored file.
    pub fn contents(&self) -> Result<BTreeMap<String, Bytes>> {
        Ok(self.read()?.contents.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryRepositoryInner>> {
        self.inner.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryRepositoryInner>> {
        self.inner.write().map_err(poisoned)
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn index(&self) -> Result<RepositoryIndex> {
        let inner = self.read()?;
        let entries = inner
            .contents
            .iter()
            .map(|(path, contents)| FileEntry::from_contents(path.clone(), contents));
        Ok(RepositoryIndex::new(entries)?)
    }

    async fn open(&self, path: &str) -> Result<(FileInfo, FileStream)> {
        let path = normalize_path(path)?;
        let inner = self.read()?;
        let contents = inner
            .contents
            .get(&path)
            .cloned()
            .ok_or(RepositoryError::FileNotFound(path))?;

        Ok((FileInfo::for_contents(&contents), Box::new(Cursor::new(contents))))
    }

    async fn save(&self, path: &str, info: &FileInfo, stream: FileStream) -> Result<()> {
        let path = normalize_path(path)?;
        if self.read()?.contents.contains_key(&path) {
            return Err(RepositoryError::DestinationExists(path));
        }

        let contents = read_stream(stream).await?;
        verify_contents(&path, info, &contents)?;

        let mut inner = self.write()?;
        if inner.contents.contains_key(&path) {
            return Err(RepositoryError::DestinationExists(path));
        }
        inner.contents.insert(path, Bytes::from(contents));
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let (from, to) = (normalize_path(from)?, normalize_path(to)?);
        let mut inner = self.write()?;
        if inner.contents.contains_key(&to) {
            return Err(RepositoryError::DestinationExists(to));
        }
        let contents = inner
            .contents
            .remove(&from)
            .ok_or(RepositoryError::FileNotFound(from))?;
        inner.contents.insert(to, contents);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let mut inner = self.write()?;
        inner
            .contents
            .remove(&path)
            .map(|_| ())
            .ok_or(RepositoryError::FileNotFound(path))
    }

    async fn metadata(&self) -> Result<RepositoryMetadata> {
        Ok(self.read()?.metadata.clone())
    }

    async fn update_metadata(&self, transform: MetadataTransform) -> Result<RepositoryMetadata> {
        let mut inner = self.write()?;
        inner.metadata = transform(inner.metadata.clone());
        Ok(inner.metadata.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryLocalRepository
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for the initial state of a [`MemoryLocalRepository`].
#[derive(Default)]
pub struct MemoryLocalState {
    tree: BTreeMap<String, Bytes>,
    index: BTreeMap<String, FileEntry>,
    metadata: RepositoryMetadata,
}

impl MemoryLocalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A file present in the working tree and recorded in the index.
    pub fn indexed(mut self, path: &str, contents: impl Into<Bytes>) -> Self {
        let contents = contents.into();
        let path = fixture_path(path);
        self.index
            .insert(path.clone(), FileEntry::from_contents(path.clone(), &contents));
        self.tree.insert(path, contents);
        self
    }

    /// A working-tree file the index does not know about.
    pub fn unindexed(mut self, path: &str, contents: impl Into<Bytes>) -> Self {
        self.tree.insert(fixture_path(path), contents.into());
        self
    }

    /// An indexed file whose bytes have disappeared from the working tree.
    pub fn missing(mut self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        let path = fixture_path(path);
        self.index
            .insert(path.clone(), FileEntry::from_contents(path, contents.as_ref()));
        self
    }

    pub fn metadata(mut self, metadata: RepositoryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(self) -> MemoryLocalRepository {
        MemoryLocalRepository {
            inner: RwLock::new(self),
        }
    }
}

fn fixture_path(path: &str) -> String {
    normalize_path(path).unwrap_or_else(|_| path.to_string())
}

/// In-memory repository with a working tree separate from its index.
pub struct MemoryLocalRepository {
    inner: RwLock<MemoryLocalState>,
}

impl MemoryLocalRepository {
    pub fn new() -> Self {
        MemoryLocalState::new().build()
    }

    /// Place a file in the working tree without indexing it.
    pub fn write_working_file(&self, path: &str, contents: impl Into<Bytes>) -> Result<()> {
        let path = normalize_path(path)?;
        self.write()?.tree.insert(path, contents.into());
        Ok(())
    }

    /// Remove a file from the working tree, leaving the index untouched.
    pub fn remove_working_file(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        self.write()?
            .tree
            .remove(&path)
            .map(|_| ())
            .ok_or(RepositoryError::FileNotFound(path))
    }

    /// Snapshot of the working tree.
    pub fn working_tree(&self) -> Result<BTreeMap<String, Bytes>> {
        Ok(self.read()?.tree.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryLocalState>> {
        self.inner.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryLocalState>> {
        self.inner.write().map_err(poisoned)
    }
}

impl Default for MemoryLocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLocalState {
    fn committed(&self, path: &str) -> Option<(&FileEntry, &Bytes)> {
        Some((self.index.get(path)?, self.tree.get(path)?))
    }

    fn occupied(&self, path: &str) -> bool {
        self.index.contains_key(path) || self.tree.contains_key(path)
    }
}

#[async_trait]
impl Repository for MemoryLocalRepository {
    async fn index(&self) -> Result<RepositoryIndex> {
        Ok(RepositoryIndex::new(self.read()?.index.values().cloned())?)
    }

    async fn open(&self, path: &str) -> Result<(FileInfo, FileStream)> {
        let path = normalize_path(path)?;
        let inner = self.read()?;
        let (entry, contents) = inner
            .committed(&path)
            .ok_or_else(|| RepositoryError::FileNotFound(path.clone()))?;

        Ok((entry.info(), Box::new(Cursor::new(contents.clone()))))
    }

    async fn save(&self, path: &str, info: &FileInfo, stream: FileStream) -> Result<()> {
        let path = normalize_path(path)?;
        if self.read()?.occupied(&path) {
            return Err(RepositoryError::DestinationExists(path));
        }

        let contents = read_stream(stream).await?;
        verify_contents(&path, info, &contents)?;

        let mut inner = self.write()?;
        if inner.occupied(&path) {
            return Err(RepositoryError::DestinationExists(path));
        }
        inner
            .index
            .insert(path.clone(), FileEntry::new(path.clone(), info.length, info.checksum));
        inner.tree.insert(path, Bytes::from(contents));
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let (from, to) = (normalize_path(from)?, normalize_path(to)?);
        let mut inner = self.write()?;
        if inner.committed(&from).is_none() {
            return Err(RepositoryError::FileNotFound(from));
        }
        if inner.occupied(&to) {
            return Err(RepositoryError::DestinationExists(to));
        }

        if let (Some(mut entry), Some(contents)) = (inner.index.remove(&from), inner.tree.remove(&from)) {
            entry.path = to.clone();
            inner.index.insert(to.clone(), entry);
            inner.tree.insert(to, contents);
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let mut inner = self.write()?;
        if inner.committed(&path).is_none() {
            return Err(RepositoryError::FileNotFound(path));
        }
        inner.index.remove(&path);
        inner.tree.remove(&path);
        Ok(())
    }

    async fn metadata(&self) -> Result<RepositoryMetadata> {
        Ok(self.read()?.metadata.clone())
    }

    async fn update_metadata(&self, transform: MetadataTransform) -> Result<RepositoryMetadata> {
        let mut inner = self.write()?;
        inner.metadata = transform(inner.metadata.clone());
        Ok(inner.metadata.clone())
    }

    fn as_local(&self) -> Option<&dyn LocalRepository> {
        Some(self)
    }
}

#[async_trait]
impl LocalRepository for MemoryLocalRepository {
    async fn find_all_files(&self, globs: &[String]) -> Result<Vec<String>> {
        let matcher = PathMatcher::new(globs)?;
        Ok(matcher.filter(self.read()?.tree.keys().cloned()))
    }

    async fn indexed_filenames(&self) -> Result<Vec<String>> {
        Ok(self.read()?.index.keys().cloned().collect())
    }

    async fn contains(&self, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        Ok(self.read()?.index.contains_key(&path))
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        Ok(self.read()?.tree.contains_key(&path))
    }

    async fn indexed_checksum(&self, path: &str) -> Result<Sha256Digest> {
        let path = normalize_path(path)?;
        self.read()?
            .index
            .get(&path)
            .map(|entry| entry.checksum)
            .ok_or(RepositoryError::FileNotFound(path))
    }

    async fn compute_checksum(&self, path: &str) -> Result<Sha256Digest> {
        let path = normalize_path(path)?;
        self.read()?
            .tree
            .get(&path)
            .map(|contents| Sha256Digest::hash(contents))
            .ok_or(RepositoryError::FileNotFound(path))
    }

    async fn add(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let mut inner = self.write()?;
        if inner.index.contains_key(&path) {
            return Err(RepositoryError::DestinationExists(path));
        }
        let entry = inner
            .tree
            .get(&path)
            .map(|contents| FileEntry::from_contents(path.clone(), contents))
            .ok_or_else(|| RepositoryError::FileNotFound(path.clone()))?;
        inner.index.insert(path, entry);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        self.write()?
            .index
            .remove(&path)
            .map(|_| ())
            .ok_or(RepositoryError::FileNotFound(path))
    }
}
