//! Error types for the engine.

use arksync_core::CoreError;
use arksync_crypto::CryptoError;
use arksync_store::RepositoryError;
use arksync_sync::{SyncError, SyncFailure};
use thiserror::Error;

/// Errors surfaced by [`Engine`](crate::Engine) and configuration loading.
#[derive(Debug, Error)]
pub enum ArksyncError {
    /// Path or index error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Encryption or signature error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Repository error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Planning or index-update error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Sync execution stopped part-way; the report shows what was applied.
    #[error("sync interrupted: {}", .0.error)]
    Interrupted(Box<SyncFailure>),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl From<SyncFailure> for ArksyncError {
    fn from(failure: SyncFailure) -> Self {
        Self::Interrupted(Box::new(failure))
    }
}

impl ArksyncError {
    /// The underlying sync error, if this is one.
    pub fn sync_error(&self) -> Option<&SyncError> {
        match self {
            Self::Sync(e) => Some(e),
            Self::Interrupted(failure) => Some(&failure.error),
            _ => None,
        }
    }

    /// Whether the same call may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Repository(e) => e.is_transient(),
            _ => self.sync_error().is_some_and(SyncError::is_retryable),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ArksyncError>;
