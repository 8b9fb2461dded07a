//! # arksync sync
//!
//! Planning and execution of one-way repository sync, plus index updates.
//!
//! ## Overview
//!
//! A sync makes a destination repository mirror a base repository's
//! content. It runs in two phases:
//!
//! 1. **Discovery**: compare both indexes and turn the differences into
//!    ordered groups of [`SyncOperation`]s according to the
//!    [`RelocationSyncMode`].
//! 2. **Execution**: apply the groups in order, prompting before each one
//!    and reporting progress after every operation.
//!
//! Nothing is ever deleted from the destination except surplus duplicates
//! under an explicit `Move { allow_duplicate_reduction: true, .. }` mode.
//!
//! ## Key Types
//!
//! - [`SyncDiscovery`] / [`DiscoveredSync`] - The plan
//! - [`SyncExecutor`] / [`SyncReport`] - Running it
//! - [`IndexUpdateProcedure`] - Reconcile a local index with its files
//! - [`AddAndPush`] - Index, then push to several destinations
//! - [`JobRegistry`] - One in-flight job per key
//!
//! ## Usage
//!
//! ```rust,no_run
//! use arksync_store::MemoryRepository;
//! use arksync_sync::{RelocationSyncMode, SyncDiscovery, SyncExecutor, SyncValidation};
//!
//! async fn example(base: &MemoryRepository, dst: &MemoryRepository) {
//!     let plan = SyncDiscovery::new(RelocationSyncMode::move_all())
//!         .prepare(base, dst)
//!         .await
//!         .unwrap();
//!     plan.validate(&SyncValidation::default()).unwrap();
//!     print!("{}", plan.render());
//!
//!     let report = SyncExecutor::default().execute(&plan, base, dst).await.unwrap();
//!     println!("{} operations applied", report.completed_count());
//! }
//! ```
//!
//! ## Group Order
//!
//! ```text
//! AdditiveDuplicating:  AdditiveRelocations -> NewFiles
//! Move { .. }:          RelocationMoves     -> NewFiles
//! Disabled:             RelocationMoves (all ignored) -> NewFiles
//! ```

pub mod add_push;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod guard;
pub mod index_update;
pub mod mode;
pub mod operations;
pub mod progress;

pub use add_push::{AddAndPush, AddAndPushReport, Destination, PushProgress};
pub use discovery::{DiscoveredGroup, DiscoveredSync, GroupKind, SyncDiscovery};
pub use error::{Result, SyncError};
pub use executor::{
    AutoConfirm, SyncExecutionOptions, SyncExecutor, SyncFailure, SyncPrompter, SyncReport,
};
pub use guard::{JobGuard, JobRegistry};
pub use index_update::{
    IndexUpdateListener, IndexUpdateOptions, IndexUpdateProcedure, IndexUpdateReport,
    IndexUpdateSelection, Move, PreparationResult,
};
pub use mode::{NewContentPolicy, RelocationSyncMode, SyncValidation};
pub use operations::{copy_file, SyncOperation};
pub use progress::{GroupProgress, NoopObserver, ProgressListener, SyncObserver, TracingObserver};
pub use tokio_util::sync::CancellationToken;
