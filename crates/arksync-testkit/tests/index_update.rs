//! Index updates against real working trees.

use std::sync::Arc;

use arksync_store::{LocalRepository, Repository};
use arksync_sync::{
    AddAndPush, CancellationToken, IndexUpdateOptions, IndexUpdateProcedure, IndexUpdateSelection,
    SyncError,
};
use arksync_testkit::{assert_contents, FixtureRepo, RecordingObserver};

fn procedure() -> IndexUpdateProcedure {
    IndexUpdateProcedure::new(vec![], IndexUpdateOptions::default())
}

#[tokio::test]
async fn renamed_file_on_disk_is_detected_as_move() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FixtureRepo::new()
        .missing("photo.jpg", "pixels")
        .unindexed("renamed.jpg", "pixels")
        .build_filesystem(dir.path())
        .await
        .unwrap();

    let result = procedure().prepare(&repo).await.unwrap();
    assert_eq!(result.moves.len(), 1);
    assert_eq!(result.moves[0].from, "photo.jpg");
    assert_eq!(result.moves[0].to, "renamed.jpg");
    assert!(result.new_files.is_empty());
    assert!(result.missing_files.is_empty());

    let listener = RecordingObserver::new();
    let report = procedure()
        .execute(&repo, &result, None, &listener, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.moved.len(), 1);
    assert_eq!(listener.events(), vec!["indexed move photo.jpg -> renamed.jpg"]);
    assert_eq!(repo.indexed_filenames().await.unwrap(), vec!["renamed.jpg"]);
    assert_contents(&repo, [("renamed.jpg", "pixels")]).await;
}

#[tokio::test]
async fn renamed_identical_files_all_become_moves() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FixtureRepo::new()
        .missing("a.jpg", "same")
        .missing("b.jpg", "same")
        .unindexed("x.jpg", "same")
        .unindexed("y.jpg", "same")
        .build_filesystem(dir.path())
        .await
        .unwrap();

    let result = procedure().prepare(&repo).await.unwrap();
    let pairs: Vec<(&str, &str)> = result
        .moves
        .iter()
        .map(|m| (m.from.as_str(), m.to.as_str()))
        .collect();
    assert_eq!(pairs, vec![("a.jpg", "x.jpg"), ("b.jpg", "y.jpg")]);
    assert!(result.new_files.is_empty());
    assert!(result.missing_files.is_empty());

    procedure()
        .execute(&repo, &result, None, &(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(repo.indexed_filenames().await.unwrap(), vec!["x.jpg", "y.jpg"]);
}

#[tokio::test]
async fn globs_restrict_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FixtureRepo::new()
        .dir("2022", |d| d.unindexed("a.jpg", "a").unindexed("b.jpg", "b"))
        .dir("2023", |d| d.unindexed("c.jpg", "c"))
        .build_filesystem(dir.path())
        .await
        .unwrap();

    let procedure = IndexUpdateProcedure::new(vec!["2022".into()], IndexUpdateOptions::default());
    let result = procedure.prepare(&repo).await.unwrap();
    assert_eq!(result.new_files, vec!["2022/a.jpg", "2022/b.jpg"]);
}

#[tokio::test]
async fn ignore_file_hides_paths() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FixtureRepo::new()
        .unindexed("keep.txt", "k")
        .unindexed("scratch/tmp.txt", "t")
        .build_filesystem(dir.path())
        .await
        .unwrap();
    std::fs::write(dir.path().join(arksync_store::IGNORE_FILE), "scratch/\n").unwrap();

    let result = procedure().prepare(&repo).await.unwrap();
    assert_eq!(result.new_files, vec!["keep.txt"]);
}

#[tokio::test]
async fn invalid_names_block_the_whole_update() {
    let repo = FixtureRepo::new()
        .unindexed("fine.txt", "1")
        .unindexed("a<b.txt", "2")
        .build_local();

    let result = procedure().prepare(&repo).await.unwrap();
    assert_eq!(result.error_files.get("a<b.txt"), Some(&'<'));
    assert!(result.render().contains("a<b.txt"));

    let err = procedure()
        .execute(&repo, &result, None, &(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidFilenames(ref files) if files.len() == 1));
    assert!(repo.indexed_filenames().await.unwrap().is_empty());
}

#[tokio::test]
async fn selection_applies_a_subset() {
    let repo = FixtureRepo::new()
        .missing("old.txt", "moved")
        .unindexed("new.txt", "moved")
        .unindexed("extra.txt", "extra")
        .build_local();

    let result = procedure().prepare(&repo).await.unwrap();
    let selection = IndexUpdateSelection {
        moves: result.moves.iter().cloned().collect(),
        new_files: Default::default(),
    };
    procedure()
        .execute(&repo, &result, Some(&selection), &(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(repo.indexed_filenames().await.unwrap(), vec!["new.txt"]);
    let rescan = procedure().prepare(&repo).await.unwrap();
    assert_eq!(rescan.new_files, vec!["extra.txt"]);
    assert!(rescan.moves.is_empty());
}

#[tokio::test]
async fn add_and_push_from_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        FixtureRepo::new()
            .file("kept.txt", "kept")
            .missing("photo.jpg", "pixels")
            .unindexed("album/photo.jpg", "pixels")
            .unindexed("notes.txt", "hello")
            .build_filesystem(dir.path())
            .await
            .unwrap(),
    );
    let mirror = Arc::new(
        FixtureRepo::new()
            .file("kept.txt", "kept")
            .file("photo.jpg", "pixels")
            .build_memory(),
    );

    let observer = Arc::new(RecordingObserver::new());
    let job = AddAndPush::new(procedure()).with_observer(observer.clone());
    let result = job.procedure().prepare(source.as_ref()).await.unwrap();
    let report = job
        .run(
            source.clone(),
            vec![("mirror".into(), mirror.clone() as Arc<dyn Repository>)],
            &result,
            None,
            &(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(
        observer.events(),
        vec!["moved photo.jpg -> album/photo.jpg", "stored notes.txt"]
    );
    assert_contents(
        mirror.as_ref(),
        [("album/photo.jpg", "pixels"), ("kept.txt", "kept"), ("notes.txt", "hello")],
    )
    .await;
}
