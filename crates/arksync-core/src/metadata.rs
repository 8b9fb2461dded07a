//! Repository-level metadata.

use serde::{Deserialize, Serialize};

/// Metadata stored alongside a repository's contents.
///
/// Repositories holding copies of the same archive share an association
/// group id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_group_id: Option<String>,

    /// Human-facing name hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl RepositoryMetadata {
    pub fn with_association_group(mut self, id: impl Into<String>) -> Self {
        self.association_group_id = Some(id.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
