//! Test fixtures and helpers.
//!
//! [`FixtureRepo`] describes a repository once and builds it on any backend.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;

use arksync_store::{
    FilesystemRepository, LocalRepository, MemoryLocalRepository, MemoryLocalState,
    MemoryRepository, Repository, RepositoryError, RepositoryExt,
};
use arksync_sync::{IndexUpdateListener, Move, SyncObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    /// On disk and in the index.
    Indexed,
    /// On disk only.
    Unindexed,
    /// In the index only.
    Missing,
}

#[derive(Debug, Clone)]
struct FixtureFile {
    contents: Vec<u8>,
    state: FileState,
}

/// Declarative repository contents.
///
/// ```rust
/// use arksync_testkit::FixtureRepo;
///
/// let fixture = FixtureRepo::new()
///     .file("new.txt", "old content")
///     .dir("2022/02", |d| d.file("01.JPG", "jpg-1").file("02.JPG", "jpg-2"));
/// assert_eq!(fixture.paths(), vec!["2022/02/01.JPG", "2022/02/02.JPG", "new.txt"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FixtureRepo {
    files: BTreeMap<String, FixtureFile>,
}

impl FixtureRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// An indexed file.
    pub fn file(self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        self.with(path, contents, FileState::Indexed)
    }

    /// A working-tree file the index does not know about.
    pub fn unindexed(self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        self.with(path, contents, FileState::Unindexed)
    }

    /// An indexed file whose working-tree copy is gone.
    pub fn missing(self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        self.with(path, contents, FileState::Missing)
    }

    /// Files declared inside `build`, placed under `prefix`.
    pub fn dir(mut self, prefix: &str, build: impl FnOnce(FixtureRepo) -> FixtureRepo) -> Self {
        let prefix = prefix.trim_end_matches('/');
        for (path, file) in build(FixtureRepo::new()).files {
            self.files.insert(format!("{prefix}/{path}"), file);
        }
        self
    }

    fn with(mut self, path: &str, contents: impl AsRef<[u8]>, state: FileState) -> Self {
        self.files.insert(
            path.to_string(),
            FixtureFile {
                contents: contents.as_ref().to_vec(),
                state,
            },
        );
        self
    }

    /// Every declared path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Indexed contents only.
    pub fn committed(&self) -> BTreeMap<String, Vec<u8>> {
        self.files
            .iter()
            .filter(|(_, f)| f.state == FileState::Indexed)
            .map(|(path, f)| (path.clone(), f.contents.clone()))
            .collect()
    }

    /// A repository with no working tree holding the indexed files.
    pub fn build_memory(&self) -> MemoryRepository {
        MemoryRepository::with_contents(self.committed())
    }

    /// An in-memory local repository, working tree included.
    pub fn build_local(&self) -> MemoryLocalRepository {
        let mut state = MemoryLocalState::new();
        for (path, file) in &self.files {
            let contents = Bytes::from(file.contents.clone());
            state = match file.state {
                FileState::Indexed => state.indexed(path, contents),
                FileState::Unindexed => state.unindexed(path, contents),
                FileState::Missing => state.missing(path, &file.contents),
            };
        }
        state.build()
    }

    /// A filesystem repository initialized at `root`.
    pub async fn build_filesystem(&self, root: &Path) -> Result<FilesystemRepository, RepositoryError> {
        let repo = FilesystemRepository::init(root)?;
        for (path, file) in &self.files {
            let on_disk = root.join(path);
            if let Some(parent) = on_disk.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&on_disk, &file.contents)?;

            match file.state {
                FileState::Indexed => repo.add(path).await?,
                FileState::Unindexed => {}
                FileState::Missing => {
                    repo.add(path).await?;
                    std::fs::remove_file(&on_disk)?;
                }
            }
        }
        Ok(repo)
    }
}

/// Assert that `repo`'s committed contents are exactly `expected`.
pub async fn assert_contents<P, C>(repo: &dyn Repository, expected: impl IntoIterator<Item = (P, C)>)
where
    P: Into<String>,
    C: AsRef<[u8]>,
{
    let expected: BTreeMap<String, Vec<u8>> = expected
        .into_iter()
        .map(|(p, c)| (p.into(), c.as_ref().to_vec()))
        .collect();

    let index = repo.index().await.expect("index");
    let actual_paths: Vec<&str> = index.paths().collect();
    let expected_paths: Vec<&str> = expected.keys().map(String::as_str).collect();
    assert_eq!(actual_paths, expected_paths, "repository paths differ");

    for (path, contents) in &expected {
        let actual = repo.read_bytes(path).await.expect("read");
        assert_eq!(&actual, contents, "contents differ at {path}");
    }
}

/// Observer and listener that records every event as a line of text.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn push(&self, event: String) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SyncObserver for RecordingObserver {
    fn on_file_stored(&self, path: &str) {
        self.push(format!("stored {path}"));
    }

    fn on_file_moved(&self, from: &str, to: &str) {
        self.push(format!("moved {from} -> {to}"));
    }

    fn on_file_deleted(&self, path: &str) {
        self.push(format!("deleted {path}"));
    }

    fn on_file_store_failed(&self, path: &str, error: &RepositoryError) {
        self.push(format!("store failed {path}: {error}"));
    }

    fn on_file_move_failed(&self, from: &str, to: &str, error: &RepositoryError) {
        self.push(format!("move failed {from} -> {to}: {error}"));
    }

    fn on_file_delete_failed(&self, path: &str, error: &RepositoryError) {
        self.push(format!("delete failed {path}: {error}"));
    }
}

impl IndexUpdateListener for RecordingObserver {
    fn on_move_completed(&self, mv: &Move) {
        self.push(format!("indexed move {} -> {}", mv.from, mv.to));
    }

    fn on_add_completed(&self, path: &str) {
        self.push(format!("indexed {path}"));
    }

    fn on_add_failed(&self, path: &str, error: &RepositoryError) {
        self.push(format!("index failed {path}: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> FixtureRepo {
        FixtureRepo::new()
            .file("a.txt", "a")
            .unindexed("b.txt", "b")
            .missing("c.txt", "c")
            .dir("d", |d| d.file("e.txt", "e"))
    }

    #[tokio::test]
    async fn test_build_memory_keeps_indexed_only() {
        let repo = fixture().build_memory();
        assert_contents(&repo, [("a.txt", "a"), ("d/e.txt", "e")]).await;
    }

    #[tokio::test]
    async fn test_build_local_states() {
        let repo = fixture().build_local();
        assert_eq!(repo.indexed_filenames().await.unwrap(), vec!["a.txt", "c.txt", "d/e.txt"]);
        assert!(repo.file_exists("b.txt").await.unwrap());
        assert!(!repo.file_exists("c.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_build_filesystem_states() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fixture().build_filesystem(dir.path()).await.unwrap();

        assert_eq!(repo.indexed_filenames().await.unwrap(), vec!["a.txt", "c.txt", "d/e.txt"]);
        assert!(repo.file_exists("b.txt").await.unwrap());
        assert!(!repo.contains("b.txt").await.unwrap());
        assert!(!dir.path().join("c.txt").exists());
    }
}
