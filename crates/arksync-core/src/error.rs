//! Error types for core operations.

use thiserror::Error;

/// Errors produced while building core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A repository path is empty, absolute, or escapes the root.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Two index entries share one path.
    #[error("duplicate path in index: {0}")]
    DuplicatePath(String),

    /// A checksum string could not be parsed.
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
