//! Proptest generators for property-based testing.
//!
//! Contents are drawn from a small pool so that generated repositories share
//! checksums often enough to produce relocations and duplicates.

use std::collections::BTreeMap;

use proptest::prelude::*;

use arksync_core::{FileEntry, RepositoryIndex};
use arksync_sync::RelocationSyncMode;

use crate::fixtures::FixtureRepo;

const CONTENT_POOL: [&str; 6] = ["alpha", "beta", "gamma", "delta", "epsilon", ""];

/// A repository path of one to three lowercase segments.
pub fn path() -> impl Strategy<Value = String> {
    "[a-z]{1,4}(/[a-z]{1,4}){0,2}".prop_map(String::from)
}

/// File contents from the shared pool.
pub fn contents() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::select(CONTENT_POOL.to_vec()).prop_map(|s| s.as_bytes().to_vec())
}

/// Path to contents map with up to `max_files` entries.
pub fn content_map(max_files: usize) -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(path(), contents(), 0..=max_files)
}

/// A repository index built from a generated content map.
pub fn index(max_files: usize) -> impl Strategy<Value = RepositoryIndex> {
    content_map(max_files).prop_map(|files| index_of(&files))
}

/// Index of an in-memory content map.
pub fn index_of(files: &BTreeMap<String, Vec<u8>>) -> RepositoryIndex {
    RepositoryIndex::new(
        files
            .iter()
            .map(|(path, contents)| FileEntry::from_contents(path.clone(), contents)),
    )
    .unwrap_or_default()
}

/// Any relocation mode.
pub fn relocation_mode() -> impl Strategy<Value = RelocationSyncMode> {
    prop_oneof![
        Just(RelocationSyncMode::Disabled),
        Just(RelocationSyncMode::AdditiveDuplicating),
        (any::<bool>(), any::<bool>()).prop_map(|(increase, reduction)| RelocationSyncMode::Move {
            allow_duplicate_increase: increase,
            allow_duplicate_reduction: reduction,
        }),
    ]
}

/// A base repository and a destination derived from it.
///
/// Every destination file is a base file, either at its own path or renamed
/// under a `moved_` prefix, and some base files are left out entirely. The
/// destination therefore never holds content base lacks, and never holds
/// different content at a base path.
pub fn diverged_pair(max_files: usize) -> impl Strategy<Value = (FixtureRepo, FixtureRepo)> {
    content_map(max_files)
        .prop_flat_map(|base| {
            let n = base.len();
            (Just(base), prop::collection::vec(0u8..3, n))
        })
        .prop_map(|(base, fates)| {
            let mut base_repo = FixtureRepo::new();
            let mut dst_repo = FixtureRepo::new();
            for ((path, contents), fate) in base.iter().zip(fates) {
                base_repo = base_repo.file(path, contents);
                dst_repo = match fate {
                    0 => dst_repo.file(path, contents),
                    1 => dst_repo.file(&format!("moved_{}", path.replace('/', "_")), contents),
                    _ => dst_repo,
                };
            }
            (base_repo, dst_repo)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_paths_are_normalized(p in path()) {
            prop_assert_eq!(arksync_core::normalize_path(&p).unwrap(), p);
        }

        #[test]
        fn index_matches_map(files in content_map(8)) {
            let index = index_of(&files);
            prop_assert_eq!(index.len(), files.len());
        }

        #[test]
        fn diverged_destination_is_drawn_from_base((base, dst) in diverged_pair(8)) {
            let base_files = base.committed();
            for (path, contents) in dst.committed() {
                if let Some(at_same_path) = base_files.get(&path) {
                    prop_assert_eq!(at_same_path, &contents);
                } else {
                    prop_assert!(path.starts_with("moved_"));
                    prop_assert!(base_files.values().any(|c| c == &contents));
                }
            }
        }
    }
}
