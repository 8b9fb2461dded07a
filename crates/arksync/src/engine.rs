//! The Engine: configured entry point for compare, sync and add.
//!
//! The engine owns the configuration and the job registries. Sync jobs are
//! keyed on the `(base, destination)` name pair and add-and-push jobs on the
//! source name, so the same pair never runs twice concurrently.

use std::sync::Arc;

use arksync_core::{compare, ComparisonResult};
use arksync_store::Repository;
use arksync_sync::{
    AddAndPush, AddAndPushReport, CancellationToken, DiscoveredSync, IndexUpdateListener,
    IndexUpdateProcedure, IndexUpdateReport, IndexUpdateSelection, JobRegistry,
    PreparationResult, SyncDiscovery, SyncExecutionOptions, SyncExecutor, SyncObserver,
    SyncReport,
};

use crate::config::ArksyncConfig;
use crate::error::Result;

/// A repository with the name jobs are keyed on.
#[derive(Clone)]
pub struct NamedRepository {
    pub name: String,
    pub repo: Arc<dyn Repository>,
}

impl NamedRepository {
    pub fn new(name: impl Into<String>, repo: Arc<dyn Repository>) -> Self {
        Self {
            name: name.into(),
            repo,
        }
    }
}

/// Configured entry point. Clones share the job registries.
#[derive(Clone)]
pub struct Engine {
    config: ArksyncConfig,
    sync_jobs: JobRegistry<(String, String)>,
    add_jobs: JobRegistry<String>,
}

impl Engine {
    pub fn new(config: ArksyncConfig) -> Self {
        Self {
            config,
            sync_jobs: JobRegistry::new(),
            add_jobs: JobRegistry::new(),
        }
    }

    pub fn config(&self) -> &ArksyncConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Compare & Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Compare two repositories' committed contents.
    pub async fn compare(&self, base: &dyn Repository, other: &dyn Repository) -> Result<ComparisonResult> {
        let (base_index, other_index) = tokio::try_join!(base.index(), other.index())?;
        Ok(compare(&base_index, &other_index))
    }

    /// Plan a sync of `dst` towards `base` under the configured mode.
    ///
    /// The plan is not validated; [`Engine::sync`] does that.
    pub async fn discover(&self, base: &dyn Repository, dst: &dyn Repository) -> Result<DiscoveredSync> {
        let discovery = SyncDiscovery::new(self.config.sync.relocation_mode);
        Ok(discovery.prepare(base, dst).await?)
    }

    /// Discover, validate and execute a sync.
    ///
    /// Fails with `JobAlreadyRunning` if the same pair is already syncing.
    /// An execution failure carries the partial report.
    pub async fn sync(
        &self,
        base: &NamedRepository,
        dst: &NamedRepository,
        options: SyncExecutionOptions,
    ) -> Result<SyncReport> {
        let _guard = self
            .sync_jobs
            .try_start((base.name.clone(), dst.name.clone()))?;

        let plan = self.discover(base.repo.as_ref(), dst.repo.as_ref()).await?;
        plan.validate(&self.config.sync.validation())?;

        tracing::info!(base = %base.name, dst = %dst.name, "sync started");
        let report = SyncExecutor::new(options)
            .execute(&plan, base.repo.as_ref(), dst.repo.as_ref())
            .await?;
        tracing::info!(
            base = %base.name,
            dst = %dst.name,
            completed = report.completed_count(),
            "sync finished"
        );
        Ok(report)
    }

    pub fn is_syncing(&self, base: &str, dst: &str) -> bool {
        self.sync_jobs.is_running(&(base.to_string(), dst.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Index Update
    // ─────────────────────────────────────────────────────────────────────────

    fn procedure(&self, globs: Vec<String>) -> IndexUpdateProcedure {
        IndexUpdateProcedure::new(globs, self.config.index_update)
    }

    /// Classify unindexed files in a local repository.
    pub async fn prepare_add(&self, repo: &dyn Repository, globs: Vec<String>) -> Result<PreparationResult> {
        Ok(self.procedure(globs).prepare(repo).await?)
    }

    /// Apply a prepared index update.
    pub async fn execute_add(
        &self,
        repo: &dyn Repository,
        result: &PreparationResult,
        selection: Option<&IndexUpdateSelection>,
        listener: &dyn IndexUpdateListener,
        cancellation: &CancellationToken,
    ) -> Result<IndexUpdateReport> {
        let report = self
            .procedure(Vec::new())
            .execute(repo, result, selection, listener, cancellation)
            .await?;
        Ok(report)
    }

    /// Apply a prepared index update to `source`, then push it to every
    /// destination concurrently.
    pub async fn add_and_push(
        &self,
        source: &NamedRepository,
        destinations: Vec<NamedRepository>,
        result: &PreparationResult,
        listener: &dyn IndexUpdateListener,
        observer: Arc<dyn SyncObserver>,
    ) -> Result<AddAndPushReport> {
        let _guard = self.add_jobs.try_start(source.name.clone())?;

        let job = AddAndPush::new(self.procedure(Vec::new())).with_observer(observer);
        let destinations = destinations
            .into_iter()
            .map(|d| (d.name, d.repo))
            .collect();
        let report = job
            .run(source.repo.clone(), destinations, result, None, listener)
            .await?;

        for name in report.failed_destinations() {
            tracing::warn!(source = %source.name, destination = name, "push incomplete");
        }
        Ok(report)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(ArksyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::ArksyncError;
    use arksync_store::{MemoryLocalState, MemoryRepository};
    use arksync_sync::{NoopObserver, RelocationSyncMode, SyncError};

    fn named(name: &str, repo: MemoryRepository) -> NamedRepository {
        NamedRepository::new(name, Arc::new(repo))
    }

    #[tokio::test]
    async fn test_sync_applies_plan() {
        let engine = Engine::default();
        let base = named("base", MemoryRepository::with_contents([("new/a.txt", "a"), ("b.txt", "b")]));
        let dst = MemoryRepository::with_contents([("old/a.txt", "a")]);
        let dst = Arc::new(dst);
        let dst_named = NamedRepository::new("dst", dst.clone());

        let report = engine
            .sync(&base, &dst_named, SyncExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(report.completed_count(), 2);
        assert_eq!(
            dst.contents().unwrap().into_keys().collect::<Vec<_>>(),
            vec!["b.txt", "new/a.txt"]
        );
        assert!(!engine.is_syncing("base", "dst"));
    }

    #[tokio::test]
    async fn test_strict_sync_rejects_disabled_relocations() {
        let engine = Engine::new(ArksyncConfig {
            sync: SyncConfig {
                relocation_mode: RelocationSyncMode::Disabled,
                strict: true,
                ..Default::default()
            },
            ..Default::default()
        });
        let base = named("base", MemoryRepository::with_contents([("new.txt", "x")]));
        let dst = named("dst", MemoryRepository::with_contents([("old.txt", "x")]));

        let err = engine
            .sync(&base, &dst, SyncExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.sync_error(),
            Some(SyncError::RelocationsPresentButPolicyDisabled { count: 1 })
        ));
    }

    #[tokio::test]
    async fn test_sync_interrupted_keeps_report() {
        let engine = Engine::default();
        let base = named("base", MemoryRepository::with_contents([("a.txt", "new")]));
        let dst = named("dst", MemoryRepository::new());

        let token = CancellationToken::new();
        token.cancel();
        let err = engine
            .sync(&base, &dst, SyncExecutionOptions::default().with_cancellation(token))
            .await
            .unwrap_err();

        match err {
            ArksyncError::Interrupted(failure) => {
                assert!(matches!(failure.error, SyncError::Cancelled));
                assert_eq!(failure.report.completed_count(), 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_sync_of_same_pair_rejected() {
        let engine = Engine::default();
        let _held = engine
            .sync_jobs
            .try_start(("base".to_string(), "dst".to_string()))
            .unwrap();

        let base = named("base", MemoryRepository::new());
        let dst = named("dst", MemoryRepository::new());
        let err = engine
            .sync(&base, &dst, SyncExecutionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err.sync_error(), Some(SyncError::JobAlreadyRunning(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_add_then_push() {
        let engine = Engine::default();
        let source = Arc::new(
            MemoryLocalState::new()
                .missing("photo.jpg", b"pixels")
                .unindexed("renamed.jpg", "pixels")
                .build(),
        );
        let mirror = Arc::new(MemoryRepository::with_contents([("photo.jpg", "pixels")]));

        let result = engine.prepare_add(source.as_ref(), vec![]).await.unwrap();
        assert_eq!(result.moves.len(), 1);

        let report = engine
            .add_and_push(
                &NamedRepository::new("source", source.clone()),
                vec![NamedRepository::new("mirror", mirror.clone())],
                &result,
                &(),
                Arc::new(NoopObserver),
            )
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.destinations["mirror"].moved, 1);
        assert_eq!(
            mirror.contents().unwrap().into_keys().collect::<Vec<_>>(),
            vec!["renamed.jpg"]
        );
    }

    #[tokio::test]
    async fn test_execute_add_on_non_local_fails() {
        let engine = Engine::default();
        let repo = MemoryRepository::new();
        let err = engine
            .execute_add(&repo, &PreparationResult::default(), None, &(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.sync_error(),
            Some(SyncError::Repository(arksync_store::RepositoryError::NotLocalRepository))
        ));
    }
}
