//! Relocation and new-content policies.

use serde::{Deserialize, Serialize};

/// How content found under different paths on each side is reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelocationSyncMode {
    /// Relocations are reported but never applied.
    Disabled,
    /// Relocated content is copied to the new paths; nothing is removed.
    AdditiveDuplicating,
    /// Relocations are applied as renames in the destination.
    Move {
        #[serde(default)]
        allow_duplicate_increase: bool,
        #[serde(default)]
        allow_duplicate_reduction: bool,
    },
}

impl RelocationSyncMode {
    /// Move mode with both duplicate-count changes allowed.
    pub const fn move_all() -> Self {
        Self::Move {
            allow_duplicate_increase: true,
            allow_duplicate_reduction: true,
        }
    }
}

impl Default for RelocationSyncMode {
    fn default() -> Self {
        Self::Move {
            allow_duplicate_increase: false,
            allow_duplicate_reduction: false,
        }
    }
}

/// What to do when destination paths would receive different content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewContentPolicy {
    /// List the paths in the plan and carry on.
    #[default]
    Report,
    /// Refuse the plan until the caller confirms.
    RequireConfirmation,
}

/// Caller-side checks applied to a discovered plan before execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncValidation {
    pub new_content_policy: NewContentPolicy,
    /// Fail when any relocation was routed to the ignore list.
    pub reject_ignored_relocations: bool,
}

impl SyncValidation {
    /// Validation used by strict callers.
    pub fn strict() -> Self {
        Self {
            new_content_policy: NewContentPolicy::Report,
            reject_ignored_relocations: true,
        }
    }
}
