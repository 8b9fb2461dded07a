//! Checksum-based comparison of two repository indexes.
//!
//! ## Overview
//!
//! [`compare`] partitions every checksum that appears in either index:
//!
//! - present on both sides with different path sets: a [`Relocation`]
//! - present only in `base`: a base-side [`ExtraGroup`]
//! - present only in `other`: an other-side [`ExtraGroup`]
//!
//! Output ordering is deterministic. Relocations are sorted by their smallest
//! base path and extra groups by their smallest path, because the result is
//! shown to people for review before anything is executed.
//!
//! Paths in `other` that would receive different content are listed in
//! [`ComparisonResult::new_content_after_move`] and
//! [`ComparisonResult::new_content_to_overwrite`]. They are never resolved
//! automatically.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::checksum::Sha256Digest;
use crate::index::RepositoryIndex;
use crate::path::path_diff;

/// Content present in both repositories under differing path sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relocation {
    pub checksum: Sha256Digest,
    pub file_size: u64,
    /// Paths holding this content in the base repository, sorted.
    pub base_filenames: Vec<String>,
    /// Paths holding this content in the other repository, sorted.
    pub other_filenames: Vec<String>,
}

impl Relocation {
    pub fn new(
        checksum: Sha256Digest,
        file_size: u64,
        mut base_filenames: Vec<String>,
        mut other_filenames: Vec<String>,
    ) -> Self {
        base_filenames.sort();
        other_filenames.sort();
        Self {
            checksum,
            file_size,
            base_filenames,
            other_filenames,
        }
    }

    /// Base paths missing from the other side, in sorted order.
    pub fn extra_base_locations(&self) -> Vec<&str> {
        let other: HashSet<&str> = self.other_filenames.iter().map(String::as_str).collect();
        self.base_filenames
            .iter()
            .map(String::as_str)
            .filter(|p| !other.contains(p))
            .collect()
    }

    /// Other paths missing from the base side, in sorted order.
    pub fn extra_other_locations(&self) -> Vec<&str> {
        let base: HashSet<&str> = self.base_filenames.iter().map(String::as_str).collect();
        self.other_filenames
            .iter()
            .map(String::as_str)
            .filter(|p| !base.contains(p))
            .collect()
    }

    /// Applying this relocation would add copies of the content.
    pub fn is_increasing_duplicates(&self) -> bool {
        self.extra_base_locations().len() > self.extra_other_locations().len()
    }

    /// Applying this relocation would remove copies of the content.
    pub fn is_decreasing_duplicates(&self) -> bool {
        self.extra_other_locations().len() > self.extra_base_locations().len()
    }

    /// Swap the roles of base and other.
    pub fn reversed(&self) -> Self {
        Self {
            checksum: self.checksum,
            file_size: self.file_size,
            base_filenames: self.other_filenames.clone(),
            other_filenames: self.base_filenames.clone(),
        }
    }
}

/// Content present in only one of the two repositories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtraGroup {
    pub checksum: Sha256Digest,
    pub file_size: u64,
    /// Every path holding this content, sorted.
    pub filenames: Vec<String>,
}

/// Classified difference between a base and an other index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub all_base_files: Vec<String>,
    pub all_other_files: Vec<String>,
    pub relocations: Vec<Relocation>,
    /// Other-side paths of a relocation that hold different content in base.
    pub new_content_after_move: Vec<String>,
    /// Other-side extra paths that hold different content in base.
    pub new_content_to_overwrite: Vec<String>,
    pub unmatched_base_extras: Vec<ExtraGroup>,
    pub unmatched_other_extras: Vec<ExtraGroup>,
}

/// Compare two indexes by content.
pub fn compare(base: &RepositoryIndex, other: &RepositoryIndex) -> ComparisonResult {
    let all_checksums: BTreeSet<&Sha256Digest> = base.checksums().chain(other.checksums()).collect();

    let mut relocations = Vec::new();
    let mut unmatched_base_extras = Vec::new();
    let mut unmatched_other_extras = Vec::new();

    for checksum in all_checksums {
        let base_paths: Vec<String> = base.with_checksum(checksum).map(|f| f.path.clone()).collect();
        let other_paths: Vec<String> = other.with_checksum(checksum).map(|f| f.path.clone()).collect();
        let file_size = base
            .with_checksum(checksum)
            .chain(other.with_checksum(checksum))
            .map(|f| f.size)
            .next()
            .unwrap_or(0);

        match (base_paths.is_empty(), other_paths.is_empty()) {
            (false, false) => {
                if base_paths != other_paths {
                    relocations.push(Relocation::new(*checksum, file_size, base_paths, other_paths));
                }
            }
            (false, true) => unmatched_base_extras.push(ExtraGroup {
                checksum: *checksum,
                file_size,
                filenames: base_paths,
            }),
            (true, false) => unmatched_other_extras.push(ExtraGroup {
                checksum: *checksum,
                file_size,
                filenames: other_paths,
            }),
            (true, true) => unreachable!("checksum drawn from one of the indexes"),
        }
    }

    relocations.sort_by(|a, b| a.base_filenames[0].cmp(&b.base_filenames[0]));
    unmatched_base_extras.sort_by(|a, b| a.filenames[0].cmp(&b.filenames[0]));
    unmatched_other_extras.sort_by(|a, b| a.filenames[0].cmp(&b.filenames[0]));

    let differs_in_base = |path: &str, checksum: &Sha256Digest| {
        base.get(path).is_some_and(|f| &f.checksum != checksum)
    };

    let new_content_after_move = relocations
        .iter()
        .flat_map(|r| {
            r.other_filenames
                .iter()
                .filter(|p| differs_in_base(p, &r.checksum))
                .cloned()
        })
        .collect();

    let new_content_to_overwrite = unmatched_other_extras
        .iter()
        .flat_map(|g| {
            g.filenames
                .iter()
                .filter(|p| differs_in_base(p, &g.checksum))
                .cloned()
        })
        .collect();

    ComparisonResult {
        all_base_files: base.paths().map(str::to_string).collect(),
        all_other_files: other.paths().map(str::to_string).collect(),
        relocations,
        new_content_after_move,
        new_content_to_overwrite,
        unmatched_base_extras,
        unmatched_other_extras,
    }
}

impl ComparisonResult {
    pub fn has_relocations(&self) -> bool {
        !self.relocations.is_empty()
    }

    /// Both sides hold exactly the same content at the same paths.
    pub fn is_identical(&self) -> bool {
        self.relocations.is_empty()
            && self.unmatched_base_extras.is_empty()
            && self.unmatched_other_extras.is_empty()
    }

    /// Some path in `other` would end up with different content.
    pub fn has_new_content_conflicts(&self) -> bool {
        !self.new_content_after_move.is_empty() || !self.new_content_to_overwrite.is_empty()
    }

    /// Number of base files whose content also exists somewhere in other.
    pub fn files_present_in_both(&self) -> usize {
        let extra: usize = self.unmatched_base_extras.iter().map(|g| g.filenames.len()).sum();
        self.all_base_files.len() - extra
    }

    /// Human-readable report of the comparison.
    pub fn render(&self, base_name: &str, other_name: &str) -> String {
        let mut out = String::new();

        if !self.unmatched_base_extras.is_empty() {
            let _ = writeln!(out, "\nExtra files in {base_name} archive:");
            for group in &self.unmatched_base_extras {
                let _ = writeln!(out, "\t{}", filenames_print(&group.filenames));
            }
        }

        if !self.unmatched_other_extras.is_empty() {
            let _ = writeln!(out, "\nExtra files in {other_name} archive:");
            for group in &self.unmatched_other_extras {
                let _ = writeln!(out, "\t{}", filenames_print(&group.filenames));
            }
        }

        if !self.relocations.is_empty() {
            let _ = writeln!(out, "\nFiles to be moved in {other_name} to match {base_name}:");
            for relocation in &self.relocations {
                let (from, to) = (relocation.extra_other_locations(), relocation.extra_base_locations());
                match (&from[..], &to[..]) {
                    ([from], [to]) => {
                        let _ = writeln!(out, "\t{}", path_diff(from, to, str::to_string));
                    }
                    _ => {
                        let _ = writeln!(out, "\t{} -> {}", filenames_print(&from), filenames_print(&to));
                    }
                }
            }
        }

        if self.has_new_content_conflicts() {
            let _ = writeln!(out, "\nPaths in {other_name} that would receive different content:");
            for path in self.new_content_after_move.iter().chain(&self.new_content_to_overwrite) {
                let _ = writeln!(out, "\t{path}");
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Extra files in {base_name} archive: {}",
            self.unmatched_base_extras.len()
        );
        let _ = writeln!(
            out,
            "Extra files in {other_name} archive: {}",
            self.unmatched_other_extras.len()
        );
        let _ = writeln!(
            out,
            "Total files present in both archives: {}",
            self.files_present_in_both()
        );

        out
    }
}

fn filenames_print<S: AsRef<str>>(filenames: &[S]) -> String {
    match filenames {
        [] => "{}".to_string(),
        [single] => single.as_ref().to_string(),
        many => format!(
            "{{{}}}",
            many.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::index::FileEntry;

    fn index(files: &[(&str, &str)]) -> RepositoryIndex {
        RepositoryIndex::new(
            files
                .iter()
                .map(|(path, contents)| FileEntry::from_contents(*path, contents.as_bytes())),
        )
        .unwrap()
    }

    #[test]
    fn test_identical_indexes() {
        let a = index(&[("a.txt", "A"), ("b.txt", "B")]);
        let result = compare(&a, &a);
        assert!(result.is_identical());
        assert_eq!(result.files_present_in_both(), 2);
    }

    #[test]
    fn test_classifies_relocations_and_extras() {
        let base = index(&[
            ("2022/02/01.JPG", "photo 1"),
            ("2022/02/02.JPG", "photo 2"),
            ("new.txt", "old content"),
        ]);
        let other = index(&[("2022/02/01.JPG", "photo 1"), ("old.txt", "old content")]);

        let result = compare(&base, &other);

        assert_eq!(result.relocations.len(), 1);
        let relocation = &result.relocations[0];
        assert_eq!(relocation.extra_base_locations(), vec!["new.txt"]);
        assert_eq!(relocation.extra_other_locations(), vec!["old.txt"]);
        assert!(!relocation.is_increasing_duplicates());
        assert!(!relocation.is_decreasing_duplicates());

        assert_eq!(result.unmatched_base_extras.len(), 1);
        assert_eq!(result.unmatched_base_extras[0].filenames, vec!["2022/02/02.JPG"]);
        assert!(result.unmatched_other_extras.is_empty());
        assert!(!result.has_new_content_conflicts());
    }

    #[test]
    fn test_subset_relocation_is_kept() {
        let base = index(&[("a", "X"), ("b", "X")]);
        let other = index(&[("a", "X")]);

        let result = compare(&base, &other);
        assert_eq!(result.relocations.len(), 1);
        assert!(result.relocations[0].is_increasing_duplicates());
        assert!(result.relocations[0].extra_other_locations().is_empty());
    }

    #[test]
    fn test_detects_new_content_conflicts() {
        // "b" moves to "c" in base, and base puts new content at "b".
        let base = index(&[("b", "fresh"), ("c", "moved")]);
        let other = index(&[("b", "moved"), ("x", "stale")]);

        let result = compare(&base, &other);
        assert_eq!(result.new_content_after_move, vec!["b"]);
        assert!(result.new_content_to_overwrite.is_empty());

        let base = index(&[("x", "fresh")]);
        let result = compare(&base, &other);
        assert_eq!(result.new_content_to_overwrite, vec!["x"]);
    }

    #[test]
    fn test_ordering_is_by_smallest_path() {
        let base = index(&[("z", "1"), ("a", "2"), ("m", "3")]);
        let other = RepositoryIndex::empty();

        let result = compare(&base, &other);
        let firsts: Vec<_> = result
            .unmatched_base_extras
            .iter()
            .map(|g| g.filenames[0].as_str())
            .collect();
        assert_eq!(firsts, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_render_mentions_moves() {
        let base = index(&[("new.txt", "c"), ("dup1", "d"), ("dup2", "d")]);
        let other = index(&[("old.txt", "c"), ("gone", "e")]);

        let text = compare(&base, &other).render("local", "backup");
        assert!(text.contains("Extra files in local archive:\n\t{dup1, dup2}"));
        assert!(text.contains("Extra files in backup archive:\n\tgone"));
        assert!(text.contains("Files to be moved in backup to match local:\n\told.txt -> new.txt"));
        assert!(text.contains("Total files present in both archives: 1"));
    }

    #[test]
    fn test_render_single_move_as_path_diff() {
        let base = index(&[("2022/feb/a.jpg", "a"), ("x", "d"), ("y", "d")]);
        let other = index(&[("2022/jan/a.jpg", "a"), ("z", "d")]);

        let text = compare(&base, &other).render("local", "backup");
        assert!(text.contains("\t2022/{jan -> feb}/a.jpg\n"));
        assert!(text.contains("\tz -> {x, y}\n"));
    }

    fn arb_index() -> impl Strategy<Value = RepositoryIndex> {
        prop::collection::btree_map("[a-e]{1,2}", 0u8..4, 0..8).prop_map(|files| {
            RepositoryIndex::new(
                files
                    .into_iter()
                    .map(|(path, content)| FileEntry::from_contents(path, &[content])),
            )
            .unwrap()
        })
    }

    proptest! {
        #[test]
        fn relocations_are_symmetric(a in arb_index(), b in arb_index()) {
            let forward = compare(&a, &b);
            let backward = compare(&b, &a);

            let mut forward_swapped: Vec<Relocation> =
                forward.relocations.iter().map(Relocation::reversed).collect();
            let mut backward_sorted = backward.relocations.clone();
            forward_swapped.sort_by_key(|r| r.checksum);
            backward_sorted.sort_by_key(|r| r.checksum);

            prop_assert_eq!(forward_swapped, backward_sorted);
            prop_assert_eq!(forward.unmatched_base_extras, backward.unmatched_other_extras);
        }

        #[test]
        fn every_base_file_is_accounted_for(a in arb_index(), b in arb_index()) {
            let result = compare(&a, &b);
            for entry in a.files() {
                let in_extra = result.unmatched_base_extras.iter().any(|g| g.filenames.contains(&entry.path));
                let on_both = b.contains_checksum(&entry.checksum);
                prop_assert!(in_extra != on_both);
            }
        }
    }
}
