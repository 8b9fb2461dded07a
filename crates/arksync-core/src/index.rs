//! Repository index: the committed (path, size, checksum) triples.
//!
//! An index is an immutable snapshot. The `by_path` and `by_checksum` lookups
//! are derived at construction and never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checksum::Sha256Digest;
use crate::error::{CoreError, Result};
use crate::path::normalize_path;

/// One committed file in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    /// Normalized, root-relative path.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 of the file contents.
    pub checksum: Sha256Digest,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, size: u64, checksum: Sha256Digest) -> Self {
        Self {
            path: path.into(),
            size,
            checksum,
        }
    }

    /// Build an entry by hashing in-memory contents.
    pub fn from_contents(path: impl Into<String>, contents: &[u8]) -> Self {
        Self::new(path, contents.len() as u64, Sha256Digest::hash(contents))
    }

    /// The size and checksum, as needed to save this file elsewhere.
    pub fn info(&self) -> FileInfo {
        FileInfo {
            length: self.size,
            checksum: self.checksum,
        }
    }
}

/// Declared length and checksum of a file stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileInfo {
    pub length: u64,
    pub checksum: Sha256Digest,
}

impl FileInfo {
    pub fn for_contents(contents: &[u8]) -> Self {
        Self {
            length: contents.len() as u64,
            checksum: Sha256Digest::hash(contents),
        }
    }
}

/// An immutable snapshot of a repository's committed contents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<FileEntry>", into = "Vec<FileEntry>")]
pub struct RepositoryIndex {
    files: Vec<FileEntry>,
    by_path: BTreeMap<String, usize>,
    by_checksum: BTreeMap<Sha256Digest, Vec<usize>>,
}

impl RepositoryIndex {
    /// Build an index from entries.
    ///
    /// Paths are normalized and entries sorted by path. Two entries with the
    /// same path are an error; two entries with the same checksum are not.
    pub fn new(files: impl IntoIterator<Item = FileEntry>) -> Result<Self> {
        let mut files = files
            .into_iter()
            .map(|mut entry| {
                entry.path = normalize_path(&entry.path)?;
                Ok(entry)
            })
            .collect::<Result<Vec<_>>>()?;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut by_path = BTreeMap::new();
        let mut by_checksum: BTreeMap<Sha256Digest, Vec<usize>> = BTreeMap::new();

        for (position, entry) in files.iter().enumerate() {
            if by_path.insert(entry.path.clone(), position).is_some() {
                return Err(CoreError::DuplicatePath(entry.path.clone()));
            }
            by_checksum.entry(entry.checksum).or_default().push(position);
        }

        Ok(Self {
            files,
            by_path,
            by_checksum,
        })
    }

    /// An index with no files.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All entries, ordered by path.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up the entry at a path.
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.by_path.get(path).map(|&i| &self.files[i])
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// All entries holding the given content, ordered by path.
    pub fn with_checksum(&self, checksum: &Sha256Digest) -> impl Iterator<Item = &FileEntry> {
        self.by_checksum
            .get(checksum)
            .into_iter()
            .flatten()
            .map(move |&i| &self.files[i])
    }

    pub fn contains_checksum(&self, checksum: &Sha256Digest) -> bool {
        self.by_checksum.contains_key(checksum)
    }

    /// Distinct checksums in ascending order.
    pub fn checksums(&self) -> impl Iterator<Item = &Sha256Digest> {
        self.by_checksum.keys()
    }

    /// All paths in ascending order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

impl TryFrom<Vec<FileEntry>> for RepositoryIndex {
    type Error = CoreError;

    fn try_from(files: Vec<FileEntry>) -> Result<Self> {
        Self::new(files)
    }
}

impl From<RepositoryIndex> for Vec<FileEntry> {
    fn from(index: RepositoryIndex) -> Self {
        index.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, contents: &str) -> FileEntry {
        FileEntry::from_contents(path, contents.as_bytes())
    }

    #[test]
    fn test_lookup_structures() {
        let index = RepositoryIndex::new(vec![
            entry("b.txt", "same"),
            entry("a.txt", "same"),
            entry("c.txt", "other"),
        ])
        .unwrap();

        assert_eq!(index.paths().collect::<Vec<_>>(), vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(index.get("c.txt").unwrap().size, 5);

        let same = Sha256Digest::hash(b"same");
        let holders: Vec<_> = index.with_checksum(&same).map(|f| f.path.as_str()).collect();
        assert_eq!(holders, vec!["a.txt", "b.txt"]);
        assert_eq!(index.checksums().count(), 2);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let result = RepositoryIndex::new(vec![entry("a.txt", "1"), entry("./a.txt", "2")]);
        assert_eq!(result, Err(CoreError::DuplicatePath("a.txt".into())));
    }

    #[test]
    fn test_paths_are_normalized() {
        let index = RepositoryIndex::new(vec![entry("dir\\file.txt", "x")]).unwrap();
        assert!(index.contains_path("dir/file.txt"));
    }

    #[test]
    fn test_serde_rebuilds_lookups() {
        let index = RepositoryIndex::new(vec![entry("a", "1"), entry("b", "1")]).unwrap();
        let json = serde_json::to_string(&index).unwrap();
        let back: RepositoryIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
        assert_eq!(back.with_checksum(&Sha256Digest::hash(b"1")).count(), 2);
    }
}
