//! Error types for repository operations.

use arksync_core::{CoreError, Sha256Digest};
use arksync_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The referenced path is not present.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A save or move target is already occupied.
    #[error("destination already exists: {0}")]
    DestinationExists(String),

    /// Streamed bytes do not hash to the declared checksum.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    /// Streamed byte count differs from the declared length.
    #[error("length mismatch for {path}: expected {expected} bytes, got {actual}")]
    LengthMismatch { path: String, expected: u64, actual: u64 },

    /// A local-only operation was invoked on a non-local repository.
    #[error("not a local repository")]
    NotLocalRepository,

    /// The repository has not been initialized at this location.
    #[error("repository not initialized at {0}")]
    NotInitialized(String),

    /// Path or index validation failed.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] CoreError),

    /// Glob pattern could not be compiled.
    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// Encrypted container error.
    #[error("container error: {0}")]
    Crypto(#[from] CryptoError),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Metadata serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Background(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepositoryError {
    /// Failures that may succeed when retried without user intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Database(_) | Self::Background(_))
    }
}

impl From<tokio::task::JoinError> for RepositoryError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Background(e.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
