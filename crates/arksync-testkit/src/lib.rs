//! # arksync testkit
//!
//! Testing utilities for arksync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: [`FixtureRepo`] declares repository contents once and
//!   builds them on the memory, local-memory or filesystem backend
//! - **Generators**: Proptest strategies for content maps, indexes and
//!   diverged repository pairs
//! - **Assertions**: [`assert_contents`] and the [`RecordingObserver`]
//!
//! The cross-crate integration tests live in this crate's `tests/`.
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use arksync_testkit::generators::diverged_pair;
//!
//! proptest! {
//!     #[test]
//!     fn sync_converges((base, dst) in diverged_pair(10)) {
//!         let base = base.build_memory();
//!         let dst = dst.build_memory();
//!         // discover, execute, compare...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{assert_contents, FixtureRepo, RecordingObserver};
pub use generators::{content_map, diverged_pair, index, index_of, relocation_mode};
