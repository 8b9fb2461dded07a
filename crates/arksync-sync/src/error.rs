//! Error types for the sync module.

use arksync_store::RepositoryError;
use thiserror::Error;

use crate::discovery::GroupKind;

/// Errors that can occur while planning or executing a sync or add.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Relocations exist but the relocation mode is `Disabled`.
    #[error("{count} relocations present but relocation sync is disabled")]
    RelocationsPresentButPolicyDisabled { count: usize },

    /// Relocations that would add copies were held back by policy.
    #[error("{count} relocations would increase duplicates, which is not allowed")]
    DuplicationIncreasePresentButDisallowed { count: usize },

    /// Relocations that would remove copies were held back by policy.
    #[error("{count} relocations would reduce duplicates, which is not allowed")]
    DuplicationReductionPresentButDisallowed { count: usize },

    /// Some relocations were routed to the ignore list.
    #[error("{count} relocations ignored")]
    IgnoredRelocationsPresent { count: usize },

    /// Paths in the destination would receive different content.
    #[error("{count} destination paths would receive new content; confirmation required")]
    NewContentRequiresConfirmation { count: usize },

    /// The prompter declined a group.
    #[error("sync abandoned at {group}")]
    SyncAbandoned { group: GroupKind },

    /// The job was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// A job for the same key is already in flight.
    #[error("job already running: {0}")]
    JobAlreadyRunning(String),

    /// New filenames contain reserved characters.
    #[error("{} filenames contain reserved characters", .0.len())]
    InvalidFilenames(Vec<(String, char)>),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl SyncError {
    /// Raised before any mutation because the plan conflicts with policy.
    ///
    /// Safe to retry after changing configuration.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::RelocationsPresentButPolicyDisabled { .. }
                | Self::DuplicationIncreasePresentButDisallowed { .. }
                | Self::DuplicationReductionPresentButDisallowed { .. }
                | Self::IgnoredRelocationsPresent { .. }
                | Self::NewContentRequiresConfirmation { .. }
                | Self::InvalidFilenames(_)
        )
    }

    /// May succeed when retried without any user decision.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::JobAlreadyRunning(_) => true,
            Self::Repository(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
