//! Repository traits: the capability set every backend provides.
//!
//! [`Repository`] is what the comparison and sync machinery consume.
//! [`LocalRepository`] adds working-tree scanning and index maintenance for
//! backends whose files can diverge from their committed index.

use std::io::Read;

use async_trait::async_trait;

use arksync_core::{FileInfo, RepositoryIndex, RepositoryMetadata, Sha256Digest};

use crate::error::{RepositoryError, Result};

/// A readable file body.
pub type FileStream = Box<dyn Read + Send>;

/// Read-modify-write step applied by [`Repository::update_metadata`].
pub type MetadataTransform = Box<dyn FnOnce(RepositoryMetadata) -> RepositoryMetadata + Send>;

/// Async interface to a content repository.
///
/// # Design Notes
///
/// - **Atomic saves**: `save` either publishes a file whose bytes match the
///   declared checksum, or leaves the destination absent.
/// - **No overwrites**: `save` and `move_file` never replace an existing path.
/// - **Last writer wins**: `update_metadata` does not detect concurrent
///   external writers.
#[async_trait]
pub trait Repository: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Content
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot of the committed contents.
    async fn index(&self) -> Result<RepositoryIndex>;

    /// Open a committed file for reading.
    ///
    /// Fails with `FileNotFound` if `path` is absent.
    async fn open(&self, path: &str) -> Result<(FileInfo, FileStream)>;

    /// Store a new file.
    ///
    /// Fails with `DestinationExists` if `path` is taken, and with
    /// `ChecksumMismatch`/`LengthMismatch` if `stream` disagrees with `info`.
    async fn save(&self, path: &str, info: &FileInfo, stream: FileStream) -> Result<()>;

    /// Rename a committed file.
    async fn move_file(&self, from: &str, to: &str) -> Result<()>;

    /// Remove a committed file.
    async fn delete(&self, path: &str) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────────

    async fn metadata(&self) -> Result<RepositoryMetadata>;

    /// Apply `transform` to the current metadata and persist the result.
    async fn update_metadata(&self, transform: MetadataTransform) -> Result<RepositoryMetadata>;

    // ─────────────────────────────────────────────────────────────────────────
    // Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    /// This repository as a local one, if it has a working tree.
    fn as_local(&self) -> Option<&dyn LocalRepository> {
        None
    }
}

/// A repository with a working tree that may diverge from its index.
#[async_trait]
pub trait LocalRepository: Repository {
    /// Working-tree files matching any of `globs`, sorted.
    ///
    /// `*` and `.` match everything.
    async fn find_all_files(&self, globs: &[String]) -> Result<Vec<String>>;

    /// Paths recorded in the index, sorted.
    async fn indexed_filenames(&self) -> Result<Vec<String>>;

    /// Whether `path` is recorded in the index.
    async fn contains(&self, path: &str) -> Result<bool>;

    /// Whether `path` is present in the working tree.
    async fn file_exists(&self, path: &str) -> Result<bool>;

    /// Checksum recorded in the index for `path`.
    async fn indexed_checksum(&self, path: &str) -> Result<Sha256Digest>;

    /// Checksum of the working-tree bytes at `path`.
    async fn compute_checksum(&self, path: &str) -> Result<Sha256Digest>;

    /// Record the working-tree file at `path` in the index.
    async fn add(&self, path: &str) -> Result<()>;

    /// Drop `path` from the index. The working-tree file is left alone.
    async fn remove(&self, path: &str) -> Result<()>;
}

/// Convenience methods available on every repository.
pub trait RepositoryExt: Repository {
    /// Read a whole file into memory.
    fn read_bytes(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Save in-memory contents, deriving the file info from the bytes.
    fn save_bytes(
        &self,
        path: &str,
        contents: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Update metadata with a closure.
    fn update_metadata_with<F>(
        &self,
        transform: F,
    ) -> impl std::future::Future<Output = Result<RepositoryMetadata>> + Send
    where
        F: FnOnce(RepositoryMetadata) -> RepositoryMetadata + Send + 'static;

    /// This repository as a local one, or `NotLocalRepository`.
    fn require_local(&self) -> Result<&dyn LocalRepository>;
}

impl<R: Repository + ?Sized> RepositoryExt for R {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let (_, stream) = self.open(path).await?;
        read_stream(stream).await
    }

    async fn save_bytes(&self, path: &str, contents: Vec<u8>) -> Result<()> {
        let info = FileInfo::for_contents(&contents);
        self.save(path, &info, Box::new(std::io::Cursor::new(contents))).await
    }

    async fn update_metadata_with<F>(&self, transform: F) -> Result<RepositoryMetadata>
    where
        F: FnOnce(RepositoryMetadata) -> RepositoryMetadata + Send + 'static,
    {
        self.update_metadata(Box::new(transform)).await
    }

    fn require_local(&self) -> Result<&dyn LocalRepository> {
        self.as_local().ok_or(RepositoryError::NotLocalRepository)
    }
}

/// Drain a stream on the blocking pool.
pub async fn read_stream(mut stream: FileStream) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    })
    .await?
}
