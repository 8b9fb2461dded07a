//! Sync discovery: from a comparison and a relocation mode to an ordered plan.
//!
//! ## Overview
//!
//! A plan holds at most two groups, in this order:
//!
//! 1. relocations ([`GroupKind::AdditiveRelocations`] or
//!    [`GroupKind::RelocationMoves`])
//! 2. new files ([`GroupKind::NewFiles`])
//!
//! Relocations run first so that renames free or establish paths before new
//! content is copied in. Relocations the mode does not allow are kept in the
//! group's ignore list and shown for review, never executed.

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use arksync_core::{compare, ComparisonResult, Relocation};
use arksync_store::Repository;

use crate::error::{Result, SyncError};
use crate::mode::{NewContentPolicy, RelocationSyncMode, SyncValidation};
use crate::operations::SyncOperation;

/// Kind of a discovered operation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    AdditiveRelocations,
    RelocationMoves,
    NewFiles,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AdditiveRelocations => "additive relocations",
            Self::RelocationMoves => "relocation moves",
            Self::NewFiles => "new files",
        })
    }
}

/// Operations of one kind, plus relocations held back by policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredGroup {
    kind: GroupKind,
    operations: Vec<SyncOperation>,
    to_ignore: Vec<Relocation>,
}

impl DiscoveredGroup {
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn operations(&self) -> &[SyncOperation] {
        &self.operations
    }

    /// Relocations present in the comparison that this group will not apply.
    pub fn to_ignore(&self) -> &[Relocation] {
        &self.to_ignore
    }

    pub fn is_no_op(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.operations.iter().map(SyncOperation::bytes_to_copy).sum()
    }
}

/// An ordered, reviewable sync plan.
#[derive(Debug, Clone)]
pub struct DiscoveredSync {
    mode: RelocationSyncMode,
    comparison: ComparisonResult,
    groups: Vec<DiscoveredGroup>,
}

impl DiscoveredSync {
    /// Nothing in any group would be executed.
    pub fn is_no_op(&self) -> bool {
        self.groups.iter().all(DiscoveredGroup::is_no_op)
    }

    pub fn mode(&self) -> RelocationSyncMode {
        self.mode
    }

    pub fn groups(&self) -> &[DiscoveredGroup] {
        &self.groups
    }

    pub fn comparison(&self) -> &ComparisonResult {
        &self.comparison
    }

    /// Every executable operation, in execution order.
    pub fn operations(&self) -> impl Iterator<Item = &SyncOperation> {
        self.groups.iter().flat_map(|g| g.operations.iter())
    }

    /// Every relocation routed to an ignore list.
    pub fn ignored(&self) -> impl Iterator<Item = &Relocation> {
        self.groups.iter().flat_map(|g| g.to_ignore.iter())
    }

    /// Check the plan against caller policy. Runs before any mutation.
    ///
    /// Ignored relocations, including every relocation under `Disabled`,
    /// are only an error for validations that reject them
    /// ([`SyncValidation::strict`]).
    pub fn validate(&self, validation: &SyncValidation) -> Result<()> {
        let ignored: Vec<&Relocation> = self.ignored().collect();

        if !ignored.is_empty() && validation.reject_ignored_relocations {
            if self.mode == RelocationSyncMode::Disabled {
                return Err(SyncError::RelocationsPresentButPolicyDisabled {
                    count: ignored.len(),
                });
            }

            let increasing = ignored.iter().filter(|r| r.is_increasing_duplicates()).count();
            if increasing > 0 {
                return Err(SyncError::DuplicationIncreasePresentButDisallowed {
                    count: increasing,
                });
            }
            let decreasing = ignored.iter().filter(|r| r.is_decreasing_duplicates()).count();
            if decreasing > 0 {
                return Err(SyncError::DuplicationReductionPresentButDisallowed {
                    count: decreasing,
                });
            }
            return Err(SyncError::IgnoredRelocationsPresent {
                count: ignored.len(),
            });
        }

        if validation.new_content_policy == NewContentPolicy::RequireConfirmation
            && self.comparison.has_new_content_conflicts()
        {
            return Err(SyncError::NewContentRequiresConfirmation {
                count: self.comparison.new_content_after_move.len()
                    + self.comparison.new_content_to_overwrite.len(),
            });
        }

        Ok(())
    }

    /// Human-readable plan for review.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if self.is_no_op() && self.ignored().next().is_none() {
            let _ = writeln!(out, "Nothing to sync.");
            return out;
        }

        for group in &self.groups {
            if !group.operations.is_empty() {
                let _ = writeln!(out, "{} ({}):", capitalize(group.kind), group.operations.len());
                for op in &group.operations {
                    let _ = writeln!(out, "\t{op}");
                }
            }
            if !group.to_ignore.is_empty() {
                let _ = writeln!(out, "Ignored relocations ({}):", group.to_ignore.len());
                for relocation in &group.to_ignore {
                    let _ = writeln!(
                        out,
                        "\t{} -> {}",
                        relocation.extra_other_locations().join(", "),
                        relocation.extra_base_locations().join(", ")
                    );
                }
            }
        }

        out
    }
}

fn capitalize(kind: GroupKind) -> String {
    let text = kind.to_string();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}

/// Builds plans for one relocation mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncDiscovery {
    mode: RelocationSyncMode,
}

impl SyncDiscovery {
    pub fn new(mode: RelocationSyncMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RelocationSyncMode {
        self.mode
    }

    /// Compare `base` against `dst` and plan the sync that aligns `dst`.
    pub async fn prepare(&self, base: &dyn Repository, dst: &dyn Repository) -> Result<DiscoveredSync> {
        let (base_index, dst_index) = tokio::try_join!(base.index(), dst.index())?;
        let comparison = compare(&base_index, &dst_index);
        Ok(self.prepare_from_comparison(comparison))
    }

    /// Plan from an existing comparison.
    pub fn prepare_from_comparison(&self, comparison: ComparisonResult) -> DiscoveredSync {
        let mut groups = Vec::new();

        if comparison.has_relocations() {
            groups.push(self.relocation_group(&comparison.relocations));
        }

        if !comparison.unmatched_base_extras.is_empty() {
            groups.push(DiscoveredGroup {
                kind: GroupKind::NewFiles,
                operations: comparison
                    .unmatched_base_extras
                    .iter()
                    .cloned()
                    .map(SyncOperation::CopyNewFile)
                    .collect(),
                to_ignore: Vec::new(),
            });
        }

        let discovered = DiscoveredSync {
            mode: self.mode,
            comparison,
            groups,
        };

        let ignored = discovered.ignored().count();
        if ignored > 0 {
            tracing::warn!(ignored, mode = ?self.mode, "relocations not applied under current mode");
        }
        tracing::info!(
            operations = discovered.operations().count(),
            groups = discovered.groups.len(),
            "sync discovered"
        );

        discovered
    }

    fn relocation_group(&self, relocations: &[Relocation]) -> DiscoveredGroup {
        match self.mode {
            RelocationSyncMode::Disabled => DiscoveredGroup {
                kind: GroupKind::RelocationMoves,
                operations: Vec::new(),
                to_ignore: relocations.to_vec(),
            },
            RelocationSyncMode::AdditiveDuplicating => DiscoveredGroup {
                kind: GroupKind::AdditiveRelocations,
                // A relocation whose base paths all exist in dst already has
                // nothing to replicate.
                operations: relocations
                    .iter()
                    .filter(|r| !r.extra_base_locations().is_empty())
                    .cloned()
                    .map(SyncOperation::AdditiveReplication)
                    .collect(),
                to_ignore: Vec::new(),
            },
            RelocationSyncMode::Move {
                allow_duplicate_increase,
                allow_duplicate_reduction,
            } => {
                let applicable = |r: &Relocation| {
                    if r.is_increasing_duplicates() {
                        allow_duplicate_increase
                    } else if r.is_decreasing_duplicates() {
                        allow_duplicate_reduction
                    } else {
                        true
                    }
                };
                let (apply, ignore): (Vec<&Relocation>, Vec<&Relocation>) =
                    relocations.iter().partition(|r| applicable(*r));

                DiscoveredGroup {
                    kind: GroupKind::RelocationMoves,
                    operations: apply
                        .into_iter()
                        .cloned()
                        .map(SyncOperation::RelocationApply)
                        .collect(),
                    to_ignore: ignore.into_iter().cloned().collect(),
                }
            }
        }
    }
}
