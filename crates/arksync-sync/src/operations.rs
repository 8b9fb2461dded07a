//! Executable sync operations.
//!
//! Each variant carries exactly the comparison element it applies. Copies
//! always read from the base repository at the same path they write in the
//! destination.

use std::fmt;

use arksync_core::{ExtraGroup, Relocation, Sha256Digest};
use arksync_store::{Repository, RepositoryError};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::progress::SyncObserver;

/// One unit of sync work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncOperation {
    /// Copy the content to every extra base location; remove nothing.
    AdditiveReplication(Relocation),
    /// Rename, and if allowed copy or delete, to match base locations.
    RelocationApply(Relocation),
    /// Copy content the destination does not have at all.
    CopyNewFile(ExtraGroup),
}

impl SyncOperation {
    pub fn checksum(&self) -> &Sha256Digest {
        match self {
            Self::AdditiveReplication(r) | Self::RelocationApply(r) => &r.checksum,
            Self::CopyNewFile(g) => &g.checksum,
        }
    }

    /// Bytes this operation will transfer into the destination.
    pub fn bytes_to_copy(&self) -> u64 {
        let copies = match self {
            Self::AdditiveReplication(r) => r.extra_base_locations().len(),
            Self::RelocationApply(r) => r
                .extra_base_locations()
                .len()
                .saturating_sub(r.extra_other_locations().len()),
            Self::CopyNewFile(g) => g.filenames.len(),
        };
        copies as u64 * self.file_size()
    }

    fn file_size(&self) -> u64 {
        match self {
            Self::AdditiveReplication(r) | Self::RelocationApply(r) => r.file_size,
            Self::CopyNewFile(g) => g.file_size,
        }
    }

    pub(crate) async fn apply(&self, ctx: &ApplyContext<'_>) -> Result<()> {
        match self {
            Self::CopyNewFile(group) => {
                for path in &group.filenames {
                    ctx.copy(path).await?;
                }
            }
            Self::AdditiveReplication(relocation) => {
                for path in relocation.extra_base_locations() {
                    ctx.copy(path).await?;
                }
            }
            Self::RelocationApply(relocation) => {
                let extra_base = relocation.extra_base_locations();
                let extra_other = relocation.extra_other_locations();

                if relocation.is_increasing_duplicates() {
                    for path in &extra_base[extra_other.len()..] {
                        ctx.copy(path).await?;
                    }
                }
                if relocation.is_decreasing_duplicates() {
                    for path in &extra_other[extra_base.len()..] {
                        ctx.delete(path).await?;
                    }
                }
                for (from, to) in extra_other.iter().zip(&extra_base) {
                    ctx.rename(from, to).await?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdditiveReplication(r) => {
                write!(f, "replicate to {}", r.extra_base_locations().join(", "))
            }
            Self::RelocationApply(r) => write!(
                f,
                "move {} -> {}",
                r.extra_other_locations().join(", "),
                r.extra_base_locations().join(", ")
            ),
            Self::CopyNewFile(g) => write!(f, "copy {}", g.filenames.join(", ")),
        }
    }
}

/// What an operation needs while it runs.
pub(crate) struct ApplyContext<'a> {
    pub base: &'a dyn Repository,
    pub dst: &'a dyn Repository,
    pub observer: &'a dyn SyncObserver,
    pub cancellation: &'a CancellationToken,
}

impl ApplyContext<'_> {
    fn checkpoint(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    async fn copy(&self, path: &str) -> Result<()> {
        self.checkpoint()?;
        match copy_file(self.base, self.dst, path).await {
            Ok(()) => {
                self.observer.on_file_stored(path);
                Ok(())
            }
            Err(e) => {
                self.observer.on_file_store_failed(path, &e);
                Err(e.into())
            }
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.checkpoint()?;
        match self.dst.delete(path).await {
            Ok(()) => {
                self.observer.on_file_deleted(path);
                Ok(())
            }
            Err(e) => {
                self.observer.on_file_delete_failed(path, &e);
                Err(e.into())
            }
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.checkpoint()?;
        match self.dst.move_file(from, to).await {
            Ok(()) => {
                self.observer.on_file_moved(from, to);
                Ok(())
            }
            Err(e) => {
                self.observer.on_file_move_failed(from, to, &e);
                Err(e.into())
            }
        }
    }
}

/// Stream `path` from `base` into `dst` under the same name.
pub async fn copy_file(
    base: &dyn Repository,
    dst: &dyn Repository,
    path: &str,
) -> std::result::Result<(), RepositoryError> {
    let (info, stream) = base.open(path).await?;
    dst.save(path, &info, stream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopObserver;
    use arksync_core::FileInfo;
    use arksync_store::{MemoryRepository, RepositoryExt};

    fn relocation(base: &[&str], other: &[&str], contents: &[u8]) -> Relocation {
        Relocation::new(
            Sha256Digest::hash(contents),
            contents.len() as u64,
            base.iter().map(|s| s.to_string()).collect(),
            other.iter().map(|s| s.to_string()).collect(),
        )
    }

    async fn run(op: &SyncOperation, base: &MemoryRepository, dst: &MemoryRepository) -> Result<()> {
        let token = CancellationToken::new();
        let ctx = ApplyContext {
            base,
            dst,
            observer: &NoopObserver,
            cancellation: &token,
        };
        op.apply(&ctx).await
    }

    fn paths(repo: &MemoryRepository) -> Vec<String> {
        repo.contents().unwrap().into_keys().collect()
    }

    #[tokio::test]
    async fn test_relocation_apply_rename() {
        let base = MemoryRepository::with_contents([("new.txt", "x")]);
        let dst = MemoryRepository::with_contents([("old.txt", "x")]);

        let op = SyncOperation::RelocationApply(relocation(&["new.txt"], &["old.txt"], b"x"));
        run(&op, &base, &dst).await.unwrap();
        assert_eq!(paths(&dst), vec!["new.txt"]);
    }

    #[tokio::test]
    async fn test_relocation_apply_increase_copies_surplus() {
        let base = MemoryRepository::with_contents([("a", "x"), ("b", "x"), ("c", "x")]);
        let dst = MemoryRepository::with_contents([("z", "x")]);

        let op = SyncOperation::RelocationApply(relocation(&["a", "b", "c"], &["z"], b"x"));
        assert_eq!(op.bytes_to_copy(), 2);
        run(&op, &base, &dst).await.unwrap();

        // "z" pairs with "a"; "b" and "c" are copied from base.
        assert_eq!(paths(&dst), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_relocation_apply_reduction_deletes_lexicographic_tail() {
        let base = MemoryRepository::with_contents([("keep", "x")]);
        let dst = MemoryRepository::with_contents([("p", "x"), ("q", "x"), ("r", "x")]);

        let op = SyncOperation::RelocationApply(relocation(&["keep"], &["p", "q", "r"], b"x"));
        assert_eq!(op.bytes_to_copy(), 0);
        run(&op, &base, &dst).await.unwrap();

        assert_eq!(paths(&dst), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_additive_replication_keeps_sources() {
        let base = MemoryRepository::with_contents([("a", "x"), ("b", "x")]);
        let dst = MemoryRepository::with_contents([("a", "x"), ("old", "x")]);

        let op = SyncOperation::AdditiveReplication(relocation(&["a", "b"], &["a", "old"], b"x"));
        run(&op, &base, &dst).await.unwrap();
        assert_eq!(paths(&dst), vec!["a", "b", "old"]);
    }

    #[tokio::test]
    async fn test_copy_new_file_stops_on_collision() {
        let base = MemoryRepository::with_contents([("a", "new"), ("b", "new")]);
        let dst = MemoryRepository::with_contents([("a", "other")]);

        let op = SyncOperation::CopyNewFile(ExtraGroup {
            checksum: Sha256Digest::hash(b"new"),
            file_size: 3,
            filenames: vec!["a".into(), "b".into()],
        });
        let err = run(&op, &base, &dst).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Repository(RepositoryError::DestinationExists(_))
        ));
        assert_eq!(dst.read_bytes("a").await.unwrap(), b"other");
        assert!(!paths(&dst).contains(&"b".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let base = MemoryRepository::with_contents([("a", "x")]);
        let dst = MemoryRepository::new();
        let token = CancellationToken::new();
        token.cancel();

        let ctx = ApplyContext {
            base: &base,
            dst: &dst,
            observer: &NoopObserver,
            cancellation: &token,
        };
        let op = SyncOperation::CopyNewFile(ExtraGroup {
            checksum: FileInfo::for_contents(b"x").checksum,
            file_size: 1,
            filenames: vec!["a".into()],
        });
        assert!(matches!(op.apply(&ctx).await, Err(SyncError::Cancelled)));
        assert!(paths(&dst).is_empty());
    }
}
