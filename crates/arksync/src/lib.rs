//! # arksync
//!
//! The unified API for arksync: content-addressed repository sync with
//! relocation detection.
//!
//! ## Overview
//!
//! arksync keeps archives of files in step across repositories:
//!
//! - **Repositories**: a committed index of `(path, size, sha256)` plus file
//!   bodies, stored on disk, encrypted at rest, or in memory
//! - **Comparison**: content identity is the checksum, so a file renamed on
//!   one side shows up as a relocation rather than a delete and an add
//! - **Sync**: one-way alignment of a destination with a base, applying
//!   relocations as renames when the configured mode allows it
//! - **Add**: index new working-tree files, turning vanished-and-reappeared
//!   content into moves
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use arksync::{ArksyncConfig, Engine, NamedRepository};
//! use arksync::store::FilesystemRepository;
//! use arksync::sync::SyncExecutionOptions;
//!
//! async fn example() {
//!     let config = ArksyncConfig::from_path("arksync.json").unwrap();
//!     arksync::init_tracing(&config.log_filter);
//!     let engine = Engine::new(config);
//!
//!     let photos = NamedRepository::new(
//!         "photos",
//!         Arc::new(FilesystemRepository::open("/srv/photos").unwrap()),
//!     );
//!     let backup = NamedRepository::new(
//!         "backup",
//!         Arc::new(FilesystemRepository::open("/mnt/backup").unwrap()),
//!     );
//!
//!     let plan = engine.discover(photos.repo.as_ref(), backup.repo.as_ref()).await.unwrap();
//!     print!("{}", plan.render());
//!
//!     let report = engine
//!         .sync(&photos, &backup, SyncExecutionOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{} operations applied", report.completed_count());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `arksync::core` - Checksums, indexes, comparison
//! - `arksync::crypto` - Keys and the encrypted file codec
//! - `arksync::store` - Repository traits and backends
//! - `arksync::sync` - Discovery, execution, index updates

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;

pub use arksync_core as core;
pub use arksync_crypto as crypto;
pub use arksync_store as store;
pub use arksync_sync as sync;

pub use config::{ArksyncConfig, SyncConfig};
pub use engine::{Engine, NamedRepository};
pub use error::{ArksyncError, Result};
pub use logging::init_tracing;

pub use arksync_core::{ComparisonResult, FileEntry, RepositoryIndex, Sha256Digest};
pub use arksync_store::{LocalRepository, Repository, RepositoryExt};
pub use arksync_sync::{RelocationSyncMode, SyncReport};
