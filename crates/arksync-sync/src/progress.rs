//! Progress events and per-file log sinks.
//!
//! Two channels leave a running job:
//!
//! - [`ProgressListener`] receives a [`GroupProgress`] snapshot after each
//!   completed operation.
//! - [`SyncObserver`] receives one event per file stored, moved or deleted,
//!   and one per failed file step.

use arksync_store::RepositoryError;
use tokio::sync::mpsc;

use crate::discovery::GroupKind;

/// Progress of one operation group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupProgress {
    pub kind: GroupKind,
    /// Operations selected for execution in this group.
    pub all: usize,
    pub completed: usize,
    /// Bytes still to be copied by the operations not yet completed.
    pub remaining_bytes: u64,
}

impl GroupProgress {
    pub fn new(kind: GroupKind, all: usize, remaining_bytes: u64) -> Self {
        Self {
            kind,
            all,
            completed: 0,
            remaining_bytes,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.all
    }

    /// Completed share in `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        if self.all == 0 {
            1.0
        } else {
            self.completed as f32 / self.all as f32
        }
    }

    /// Short human-readable status line.
    pub fn summary(&self) -> String {
        match self.kind {
            GroupKind::AdditiveRelocations => {
                format!("replicated {} of {}", self.completed, self.all)
            }
            GroupKind::RelocationMoves => format!("moved {} of {}", self.completed, self.all),
            GroupKind::NewFiles => format!(
                "copied {} of {} {}",
                self.completed,
                self.all,
                if self.all == 1 { "file" } else { "files" }
            ),
        }
    }
}

/// Receives group progress snapshots.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, progress: &GroupProgress);
}

/// Forward snapshots into a channel; a dropped receiver is not an error.
impl ProgressListener for mpsc::UnboundedSender<GroupProgress> {
    fn on_progress(&self, progress: &GroupProgress) {
        let _ = self.send(progress.clone());
    }
}

/// Per-file log sink for sync execution.
///
/// Every method defaults to doing nothing.
pub trait SyncObserver: Send + Sync {
    fn on_file_stored(&self, _path: &str) {}

    fn on_file_moved(&self, _from: &str, _to: &str) {}

    fn on_file_deleted(&self, _path: &str) {}

    fn on_file_store_failed(&self, _path: &str, _error: &RepositoryError) {}

    fn on_file_move_failed(&self, _from: &str, _to: &str, _error: &RepositoryError) {}

    fn on_file_delete_failed(&self, _path: &str, _error: &RepositoryError) {}
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// Observer that writes every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_file_stored(&self, path: &str) {
        tracing::debug!(path, "file stored");
    }

    fn on_file_moved(&self, from: &str, to: &str) {
        tracing::debug!(from, to, "file moved");
    }

    fn on_file_deleted(&self, path: &str) {
        tracing::debug!(path, "file deleted");
    }

    fn on_file_store_failed(&self, path: &str, error: &RepositoryError) {
        tracing::warn!(path, %error, "file store failed");
    }

    fn on_file_move_failed(&self, from: &str, to: &str, error: &RepositoryError) {
        tracing::warn!(from, to, %error, "file move failed");
    }

    fn on_file_delete_failed(&self, path: &str, error: &RepositoryError) {
        tracing::warn!(path, %error, "file delete failed");
    }
}
