//! # arksync store
//!
//! Repository abstraction and its backends.
//!
//! ## Overview
//!
//! Every backend implements [`Repository`]: a committed index, streamed
//! reads and verified saves, moves, deletes and metadata. Backends with a
//! working tree also implement [`LocalRepository`], which adds scanning and
//! index maintenance.
//!
//! ## Key Types
//!
//! - [`Repository`] / [`LocalRepository`] - The async traits
//! - [`FilesystemRepository`] - Working tree plus SQLite index
//! - [`EncryptedRepository`] - Encrypted containers at rest
//! - [`MemoryRepository`] / [`MemoryLocalRepository`] - In-memory, for tests
//! - [`PathMatcher`] - Glob selection of repository paths
//!
//! ## Usage
//!
//! ```rust,no_run
//! use arksync_store::{FilesystemRepository, Repository, RepositoryExt};
//!
//! async fn example() {
//!     let repo = FilesystemRepository::init("/srv/photos").unwrap();
//!     repo.save_bytes("2022/01.jpg", b"...".to_vec()).await.unwrap();
//!     let index = repo.index().await.unwrap();
//!     assert!(index.contains_path("2022/01.jpg"));
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Verified saves**: bytes are hashed while streaming and checked
//!   against the declared [`FileInfo`](arksync_core::FileInfo) before the
//!   file becomes visible
//! - **Staging**: on-disk backends write into a staging directory and
//!   rename into place
//! - **No overwrites**: saves and moves fail with `DestinationExists`

pub mod encrypted;
pub mod error;
pub mod filesystem;
pub mod index_store;
pub mod matcher;
pub mod memory;
pub mod migration;
mod staging;
pub mod traits;

pub use encrypted::EncryptedRepository;
pub use error::{RepositoryError, Result};
pub use filesystem::{FilesystemRepository, CONTROL_DIR, IGNORE_FILE};
pub use index_store::SqliteIndexStore;
pub use matcher::PathMatcher;
pub use memory::{MemoryLocalRepository, MemoryLocalState, MemoryRepository};
pub use traits::{read_stream, FileStream, LocalRepository, MetadataTransform, Repository, RepositoryExt};
