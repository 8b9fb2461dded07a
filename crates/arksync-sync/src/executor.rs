//! Sync execution.
//!
//! Groups run in plan order, operations within a group run one at a time.
//! Before each group the prompter is asked for confirmation. The first
//! failure stops the sync; everything completed before it stays applied and
//! is described by the partial [`SyncReport`] inside the [`SyncFailure`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use arksync_store::Repository;

use crate::discovery::{DiscoveredGroup, DiscoveredSync};
use crate::error::SyncError;
use crate::operations::{ApplyContext, SyncOperation};
use crate::progress::{GroupProgress, ProgressListener, SyncObserver, TracingObserver};

/// Asked before each group executes.
#[async_trait]
pub trait SyncPrompter: Send + Sync {
    /// Return `false` to abandon the sync at this group.
    async fn confirm(&self, group: &DiscoveredGroup) -> bool;
}

/// Prompter that confirms every group.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait]
impl SyncPrompter for AutoConfirm {
    async fn confirm(&self, _group: &DiscoveredGroup) -> bool {
        true
    }
}

/// Knobs for a single execution.
#[derive(Clone)]
pub struct SyncExecutionOptions {
    pub prompter: Arc<dyn SyncPrompter>,
    pub observer: Arc<dyn SyncObserver>,
    pub progress: Option<Arc<dyn ProgressListener>>,
    /// Run only these operations; `None` runs everything.
    pub limit_to: Option<HashSet<SyncOperation>>,
    pub cancellation: CancellationToken,
}

impl Default for SyncExecutionOptions {
    fn default() -> Self {
        Self {
            prompter: Arc::new(AutoConfirm),
            observer: Arc::new(TracingObserver),
            progress: None,
            limit_to: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl SyncExecutionOptions {
    pub fn with_prompter(mut self, prompter: Arc<dyn SyncPrompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_progress(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.progress = Some(listener);
        self
    }

    pub fn limit_to(mut self, operations: impl IntoIterator<Item = SyncOperation>) -> Self {
        self.limit_to = Some(operations.into_iter().collect());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// What an execution accomplished.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// The plan had nothing to apply; no prompt was shown.
    pub no_op: bool,
    /// Final progress of every group that started.
    pub groups: Vec<GroupProgress>,
    /// Operations that completed, in order.
    pub completed: Vec<SyncOperation>,
}

impl SyncReport {
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

/// A failed execution and the work done before it failed.
#[derive(Debug)]
pub struct SyncFailure {
    pub error: SyncError,
    pub report: SyncReport,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (after {} completed operations)",
            self.error,
            self.report.completed.len()
        )
    }
}

impl std::error::Error for SyncFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<SyncFailure> for SyncError {
    fn from(failure: SyncFailure) -> Self {
        failure.error
    }
}

/// Runs discovered plans.
#[derive(Clone, Default)]
pub struct SyncExecutor {
    options: SyncExecutionOptions,
}

impl SyncExecutor {
    pub fn new(options: SyncExecutionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SyncExecutionOptions {
        &self.options
    }

    fn selected(&self, op: &SyncOperation) -> bool {
        self.options
            .limit_to
            .as_ref()
            .map_or(true, |subset| subset.contains(op))
    }

    /// Apply `discovered` to `dst`, reading content from `base`.
    pub async fn execute(
        &self,
        discovered: &DiscoveredSync,
        base: &dyn Repository,
        dst: &dyn Repository,
    ) -> std::result::Result<SyncReport, SyncFailure> {
        let mut report = SyncReport::default();

        if discovered.is_no_op() {
            tracing::info!("nothing to sync");
            report.no_op = true;
            return Ok(report);
        }

        let ctx = ApplyContext {
            base,
            dst,
            observer: self.options.observer.as_ref(),
            cancellation: &self.options.cancellation,
        };

        for group in discovered.groups() {
            let selected: Vec<&SyncOperation> =
                group.operations().iter().filter(|op| self.selected(op)).collect();
            if selected.is_empty() {
                continue;
            }

            if !self.options.prompter.confirm(group).await {
                tracing::warn!(group = %group.kind(), "sync abandoned");
                return Err(SyncFailure {
                    error: SyncError::SyncAbandoned { group: group.kind() },
                    report,
                });
            }

            let remaining = selected.iter().map(|op| op.bytes_to_copy()).sum();
            let mut progress = GroupProgress::new(group.kind(), selected.len(), remaining);
            tracing::info!(group = %group.kind(), operations = selected.len(), "group started");

            for op in selected {
                let outcome = if self.options.cancellation.is_cancelled() {
                    Err(SyncError::Cancelled)
                } else {
                    op.apply(&ctx).await
                };

                if let Err(error) = outcome {
                    if matches!(error, SyncError::Cancelled) {
                        tracing::warn!(group = %group.kind(), completed = progress.completed, "sync cancelled");
                    } else {
                        tracing::warn!(group = %group.kind(), operation = %op, %error, "operation failed");
                    }
                    report.groups.push(progress);
                    return Err(SyncFailure { error, report });
                }

                progress.completed += 1;
                progress.remaining_bytes = progress.remaining_bytes.saturating_sub(op.bytes_to_copy());
                report.completed.push(op.clone());
                if let Some(listener) = &self.options.progress {
                    listener.on_progress(&progress);
                }

                tokio::task::yield_now().await;
            }

            tracing::info!(group = %group.kind(), summary = %progress.summary(), "group finished");
            report.groups.push(progress);
        }

        Ok(report)
    }
}
