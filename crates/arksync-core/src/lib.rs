//! # arksync core
//!
//! Pure value types shared by every arksync crate. Nothing here performs I/O
//! beyond hashing a caller-supplied reader.
//!
//! ## Overview
//!
//! Files are identified by the SHA-256 of their bytes, not by their path. A
//! [`RepositoryIndex`] is an immutable snapshot of a repository's committed
//! files, and [`compare`] classifies the difference between two snapshots
//! into relocations and extra content.
//!
//! ## Key Types
//!
//! - [`Sha256Digest`] - Content identity
//! - [`FileEntry`] / [`FileInfo`] - A committed file and a stream declaration
//! - [`RepositoryIndex`] - Snapshot with `by_path` and `by_checksum` lookups
//! - [`RepositoryMetadata`] - Repository-level metadata
//! - [`ComparisonResult`] - Output of [`compare`]
//!
//! ## Usage
//!
//! ```rust
//! use arksync_core::{compare, FileEntry, RepositoryIndex};
//!
//! let base = RepositoryIndex::new(vec![FileEntry::from_contents("new.txt", b"x")]).unwrap();
//! let other = RepositoryIndex::new(vec![FileEntry::from_contents("old.txt", b"x")]).unwrap();
//!
//! let result = compare(&base, &other);
//! assert_eq!(result.relocations.len(), 1);
//! ```

pub mod checksum;
pub mod compare;
pub mod error;
pub mod index;
pub mod metadata;
pub mod path;

pub use checksum::{Sha256Digest, Sha256Hasher};
pub use compare::{compare, ComparisonResult, ExtraGroup, Relocation};
pub use error::{CoreError, Result};
pub use index::{FileEntry, FileInfo, RepositoryIndex};
pub use metadata::RepositoryMetadata;
pub use path::{find_reserved_char, normalize_path, path_diff, RESERVED_FILENAME_CHARS};
