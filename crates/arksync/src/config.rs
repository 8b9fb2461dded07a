//! Engine configuration, loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use arksync_sync::{IndexUpdateOptions, NewContentPolicy, RelocationSyncMode, SyncValidation};

use crate::error::{ArksyncError, Result};

/// How syncs are planned and checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub relocation_mode: RelocationSyncMode,
    pub new_content_policy: NewContentPolicy,
    /// Refuse plans that leave any relocation unapplied.
    pub strict: bool,
}

impl SyncConfig {
    pub fn validation(&self) -> SyncValidation {
        SyncValidation {
            new_content_policy: self.new_content_policy,
            reject_ignored_relocations: self.strict,
        }
    }
}

/// Top-level configuration.
///
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArksyncConfig {
    pub sync: SyncConfig,
    pub index_update: IndexUpdateOptions,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ArksyncConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            index_update: IndexUpdateOptions::default(),
            log_filter: "info".into(),
        }
    }
}

impl ArksyncConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ArksyncError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ArksyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = ArksyncConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ArksyncConfig::default());
        assert_eq!(config.log_filter, "info");
        assert!(config.index_update.detect_moves);
        assert_eq!(config.sync.relocation_mode, RelocationSyncMode::default());
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "sync": {
                "relocation_mode": { "kind": "move", "allow_duplicate_reduction": true },
                "new_content_policy": "require_confirmation",
                "strict": true
            },
            "index_update": { "detect_moves": false },
            "log_filter": "arksync=debug"
        }"#;
        let config = ArksyncConfig::from_json_str(json).unwrap();

        assert_eq!(
            config.sync.relocation_mode,
            RelocationSyncMode::Move {
                allow_duplicate_increase: false,
                allow_duplicate_reduction: true
            }
        );
        assert_eq!(
            config.sync.validation(),
            SyncValidation {
                new_content_policy: NewContentPolicy::RequireConfirmation,
                reject_ignored_relocations: true,
            }
        );
        assert!(!config.index_update.detect_moves);
        assert!(config.index_update.validate_filenames);
        assert_eq!(config.log_filter, "arksync=debug");
    }

    #[test]
    fn test_invalid_json() {
        let err = ArksyncConfig::from_json_str(r#"{"sync": {"relocation_mode": "sideways"}}"#)
            .unwrap_err();
        assert!(matches!(err, ArksyncError::Config(_)));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arksync.json");
        std::fs::write(&path, r#"{"sync": {"relocation_mode": {"kind": "disabled"}}}"#).unwrap();

        let config = ArksyncConfig::from_path(&path).unwrap();
        assert_eq!(config.sync.relocation_mode, RelocationSyncMode::Disabled);

        let missing = ArksyncConfig::from_path(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ArksyncError::Config(_))));
    }
}
