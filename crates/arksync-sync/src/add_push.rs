//! Index the working tree, then push the changes to several destinations.
//!
//! The index update runs first and must succeed. Each destination then gets
//! its own task on a [`JoinSet`]: the indexed moves are replayed as renames,
//! then the newly indexed files are copied from the source. A failing
//! destination stops at its first error without affecting the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use arksync_store::Repository;

use crate::error::{Result, SyncError};
use crate::index_update::{
    IndexUpdateListener, IndexUpdateProcedure, IndexUpdateReport, IndexUpdateSelection, Move,
    PreparationResult,
};
use crate::operations::copy_file;
use crate::progress::{SyncObserver, TracingObserver};

/// Outcome of the push to one destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushProgress {
    pub moved: usize,
    pub added: usize,
    /// The error that stopped this destination, if any.
    pub error: Option<String>,
}

impl PushProgress {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of an add-and-push job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddAndPushReport {
    pub index: IndexUpdateReport,
    /// Keyed by destination name.
    pub destinations: BTreeMap<String, PushProgress>,
}

impl AddAndPushReport {
    pub fn is_success(&self) -> bool {
        self.destinations.values().all(PushProgress::is_success)
    }

    pub fn failed_destinations(&self) -> impl Iterator<Item = &str> {
        self.destinations
            .iter()
            .filter(|(_, progress)| !progress.is_success())
            .map(|(name, _)| name.as_str())
    }
}

/// A named push target.
pub type Destination = (String, Arc<dyn Repository>);

/// Runs an index update on a local source and fans the result out.
#[derive(Clone)]
pub struct AddAndPush {
    procedure: IndexUpdateProcedure,
    observer: Arc<dyn SyncObserver>,
    cancellation: CancellationToken,
}

impl AddAndPush {
    pub fn new(procedure: IndexUpdateProcedure) -> Self {
        Self {
            procedure,
            observer: Arc::new(TracingObserver),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn procedure(&self) -> &IndexUpdateProcedure {
        &self.procedure
    }

    /// Apply `result` to `source`, then push what was applied.
    ///
    /// Fails only when the index update fails; destination failures are
    /// recorded in the report.
    pub async fn run(
        &self,
        source: Arc<dyn Repository>,
        destinations: Vec<Destination>,
        result: &PreparationResult,
        selection: Option<&IndexUpdateSelection>,
        listener: &dyn IndexUpdateListener,
    ) -> Result<AddAndPushReport> {
        let index = self
            .procedure
            .execute(source.as_ref(), result, selection, listener, &self.cancellation)
            .await?;

        let moves = Arc::new(index.moved.clone());
        let added = Arc::new(index.added.clone());

        // Pre-filled so a destination whose task dies still shows up as failed.
        let mut report = AddAndPushReport {
            index,
            destinations: destinations
                .iter()
                .map(|(name, _)| {
                    let progress = PushProgress {
                        error: Some("push task did not complete".into()),
                        ..Default::default()
                    };
                    (name.clone(), progress)
                })
                .collect(),
        };

        let mut tasks = JoinSet::new();
        for (name, dst) in destinations {
            let push = DestinationPush {
                source: source.clone(),
                dst,
                observer: self.observer.clone(),
                cancellation: self.cancellation.clone(),
            };
            let (moves, added) = (moves.clone(), added.clone());
            tasks.spawn(async move {
                let progress = push.run(&name, &moves, &added).await;
                (name, progress)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, progress)) => {
                    report.destinations.insert(name, progress);
                }
                Err(e) => tracing::warn!(error = %e, "push task failed"),
            }
        }

        Ok(report)
    }
}

struct DestinationPush {
    source: Arc<dyn Repository>,
    dst: Arc<dyn Repository>,
    observer: Arc<dyn SyncObserver>,
    cancellation: CancellationToken,
}

impl DestinationPush {
    async fn run(&self, name: &str, moves: &[Move], added: &[String]) -> PushProgress {
        let mut progress = PushProgress::default();
        if let Err(e) = self.push(moves, added, &mut progress).await {
            tracing::warn!(destination = name, error = %e, "push stopped");
            progress.error = Some(e.to_string());
        } else {
            tracing::info!(
                destination = name,
                moved = progress.moved,
                added = progress.added,
                "push finished"
            );
        }
        progress
    }

    async fn push(&self, moves: &[Move], added: &[String], progress: &mut PushProgress) -> Result<()> {
        for mv in moves {
            self.checkpoint()?;
            if let Err(e) = self.dst.move_file(&mv.from, &mv.to).await {
                self.observer.on_file_move_failed(&mv.from, &mv.to, &e);
                return Err(e.into());
            }
            self.observer.on_file_moved(&mv.from, &mv.to);
            progress.moved += 1;
        }

        for path in added {
            self.checkpoint()?;
            if let Err(e) = copy_file(self.source.as_ref(), self.dst.as_ref(), path).await {
                self.observer.on_file_store_failed(path, &e);
                return Err(e.into());
            }
            self.observer.on_file_stored(path);
            progress.added += 1;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}
