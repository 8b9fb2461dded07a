//! Index update: reconcile a local repository's index with its working tree.
//!
//! ## Overview
//!
//! [`IndexUpdateProcedure::prepare`] scans the working tree and classifies
//! every unindexed file:
//!
//! - a **move** when its checksum matches an indexed file that vanished
//!   from disk
//! - a **new file** otherwise
//!
//! Indexed files that vanished and matched nothing are reported as
//! **missing** and left alone. [`IndexUpdateProcedure::execute`] applies
//! moves first, then adds.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use arksync_core::{find_reserved_char, Sha256Digest};
use arksync_store::{LocalRepository, Repository, RepositoryError, RepositoryExt};

use crate::error::{Result, SyncError};
use crate::progress::TracingObserver;

/// Switches for [`IndexUpdateProcedure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexUpdateOptions {
    /// Reject new filenames containing reserved characters.
    pub validate_filenames: bool,
    /// Match new files against vanished indexed files by checksum.
    pub detect_moves: bool,
}

impl Default for IndexUpdateOptions {
    fn default() -> Self {
        Self {
            validate_filenames: true,
            detect_moves: true,
        }
    }
}

/// An indexed file found again under a new path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Move {
    pub from: String,
    pub to: String,
    pub checksum: Sha256Digest,
    pub size: u64,
}

/// Classification of the working tree against the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparationResult {
    pub new_files: Vec<String>,
    pub moves: Vec<Move>,
    pub missing_files: Vec<String>,
    /// Unindexed filenames with the reserved character they contain.
    pub error_files: BTreeMap<String, char>,
}

impl PreparationResult {
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.moves.is_empty()
    }

    /// Fail if any new filename was rejected.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.error_files.is_empty() {
            return Ok(());
        }
        Err(SyncError::InvalidFilenames(
            self.error_files
                .iter()
                .map(|(path, c)| (path.clone(), *c))
                .collect(),
        ))
    }

    /// Human-readable summary for review.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.error_files.is_empty() {
            let _ = writeln!(out, "Files with invalid names:");
            for (path, c) in &self.error_files {
                let _ = writeln!(out, "\t{path} (contains '{c}')");
            }
            let _ = writeln!(out);
        }

        if !self.missing_files.is_empty() {
            let _ = writeln!(out, "Missing indexed files not matched by add:");
            for path in &self.missing_files {
                let _ = writeln!(out, "\t{path}");
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "New files to be indexed:");
        for path in &self.new_files {
            let _ = writeln!(out, "\t{path}");
        }

        if !self.moves.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Files to be moved:");
            for mv in &self.moves {
                let _ = writeln!(out, "\t{} -> {}", mv.from, mv.to);
            }
        }

        out
    }
}

/// Subset of a [`PreparationResult`] to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexUpdateSelection {
    pub moves: HashSet<Move>,
    pub new_files: HashSet<String>,
}

impl IndexUpdateSelection {
    /// Everything in `result`.
    pub fn all(result: &PreparationResult) -> Self {
        Self {
            moves: result.moves.iter().cloned().collect(),
            new_files: result.new_files.iter().cloned().collect(),
        }
    }
}

/// Per-file feedback from [`IndexUpdateProcedure::execute`].
///
/// Every method defaults to doing nothing; `()` is the silent listener.
pub trait IndexUpdateListener: Send + Sync {
    fn on_move_completed(&self, _mv: &Move) {}

    fn on_move_failed(&self, _mv: &Move, _error: &RepositoryError) {}

    fn on_moves_finished(&self, _completed: usize, _selected: usize) {}

    fn on_add_completed(&self, _path: &str) {}

    fn on_add_failed(&self, _path: &str, _error: &RepositoryError) {}

    fn on_adds_finished(&self, _completed: usize, _selected: usize) {}
}

impl IndexUpdateListener for () {}

impl IndexUpdateListener for TracingObserver {
    fn on_move_failed(&self, mv: &Move, error: &RepositoryError) {
        tracing::warn!(from = %mv.from, to = %mv.to, %error, "indexing move failed");
    }

    fn on_moves_finished(&self, completed: usize, selected: usize) {
        tracing::info!("moved {completed} of {selected} files");
    }

    fn on_add_failed(&self, path: &str, error: &RepositoryError) {
        tracing::warn!(path, %error, "indexing failed");
    }

    fn on_adds_finished(&self, completed: usize, selected: usize) {
        tracing::info!("added {completed} of {selected} files");
    }
}

/// What an index update applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexUpdateReport {
    pub moved: Vec<Move>,
    pub added: Vec<String>,
}

/// Reconciles a local repository's index with its working tree.
#[derive(Debug, Clone, Default)]
pub struct IndexUpdateProcedure {
    pub globs: Vec<String>,
    pub options: IndexUpdateOptions,
}

impl IndexUpdateProcedure {
    pub fn new(globs: Vec<String>, options: IndexUpdateOptions) -> Self {
        Self { globs, options }
    }

    /// Classify the working tree. Nothing is modified.
    pub async fn prepare(&self, repo: &dyn Repository) -> Result<PreparationResult> {
        let local = repo.require_local()?;

        let mut unindexed = Vec::new();
        for path in local.find_all_files(&self.globs).await? {
            if !local.contains(&path).await? {
                unindexed.push(path);
            }
        }

        let error_files: BTreeMap<String, char> = if self.options.validate_filenames {
            unindexed
                .iter()
                .filter_map(|path| find_reserved_char(path).map(|c| (path.clone(), c)))
                .collect()
        } else {
            BTreeMap::new()
        };

        let mut result = if self.options.detect_moves {
            detect_moves(local, unindexed).await?
        } else {
            PreparationResult {
                new_files: unindexed,
                ..Default::default()
            }
        };
        result.error_files = error_files;

        result.new_files.sort();
        result.moves.sort();
        result.missing_files.sort();

        tracing::info!(
            new_files = result.new_files.len(),
            moves = result.moves.len(),
            missing = result.missing_files.len(),
            invalid = result.error_files.len(),
            "index update prepared"
        );
        Ok(result)
    }

    /// Apply `result` to the index: moves first, then new files.
    ///
    /// `selection` restricts which entries are applied. The first failure
    /// aborts; entries applied before it stay applied.
    pub async fn execute(
        &self,
        repo: &dyn Repository,
        result: &PreparationResult,
        selection: Option<&IndexUpdateSelection>,
        listener: &dyn IndexUpdateListener,
        cancellation: &CancellationToken,
    ) -> Result<IndexUpdateReport> {
        result.ensure_valid()?;
        let local = repo.require_local()?;
        let mut report = IndexUpdateReport::default();

        let moves: Vec<&Move> = result
            .moves
            .iter()
            .filter(|mv| selection.map_or(true, |s| s.moves.contains(*mv)))
            .collect();
        for mv in &moves {
            check_cancelled(cancellation)?;
            let applied = async {
                local.add(&mv.to).await?;
                local.remove(&mv.from).await
            }
            .await;
            if let Err(e) = applied {
                listener.on_move_failed(mv, &e);
                return Err(e.into());
            }
            tracing::debug!(from = %mv.from, to = %mv.to, "move indexed");
            listener.on_move_completed(mv);
            report.moved.push((*mv).clone());
            tokio::task::yield_now().await;
        }
        listener.on_moves_finished(report.moved.len(), moves.len());

        let adds: Vec<&String> = result
            .new_files
            .iter()
            .filter(|path| selection.map_or(true, |s| s.new_files.contains(*path)))
            .collect();
        for path in &adds {
            check_cancelled(cancellation)?;
            if let Err(e) = local.add(path).await {
                listener.on_add_failed(path, &e);
                return Err(e.into());
            }
            tracing::debug!(path = %path, "file indexed");
            listener.on_add_completed(path);
            report.added.push((*path).clone());
            tokio::task::yield_now().await;
        }
        listener.on_adds_finished(report.added.len(), adds.len());

        tracing::info!(moved = report.moved.len(), added = report.added.len(), "index update finished");
        Ok(report)
    }
}

fn check_cancelled(cancellation: &CancellationToken) -> Result<()> {
    if cancellation.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

async fn detect_moves(local: &dyn LocalRepository, mut unindexed: Vec<String>) -> Result<PreparationResult> {
    // Vanished paths queue per checksum in sorted order; unindexed files claim
    // them in sorted order, so identical renamed files pair up positionally.
    let mut vanished: HashMap<Sha256Digest, VecDeque<(String, u64)>> = HashMap::new();
    let mut indexed = local.indexed_filenames().await?;
    indexed.sort();
    let index = local.index().await?;
    for path in indexed {
        if local.file_exists(&path).await? {
            continue;
        }
        let checksum = local.indexed_checksum(&path).await?;
        let size = index.get(&path).map_or(0, |entry| entry.size);
        vanished.entry(checksum).or_default().push_back((path, size));
    }

    let mut result = PreparationResult::default();
    unindexed.sort();
    for path in unindexed {
        let checksum = local.compute_checksum(&path).await?;
        match vanished.get_mut(&checksum).and_then(VecDeque::pop_front) {
            Some((from, size)) => result.moves.push(Move {
                from,
                to: path,
                checksum,
                size,
            }),
            None => result.new_files.push(path),
        }
    }

    result.missing_files = vanished
        .into_values()
        .flatten()
        .map(|(path, _)| path)
        .collect();

    Ok(result)
}
