// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end reorganization scenarios against a scratch folder

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quantum_organizer::advisor::{FileChange, PlanAdvisor};
use quantum_organizer::error::{RestoreError, ValidationError};
use quantum_organizer::history::RequestKind;
use quantum_organizer::{AppConfig, FileOperation, Reorganizer, Stage};

fn quiet_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.suggestions.inter_item_delay_ms = 0;
    config
}

/// Every path under `root`, relative, with file contents
fn snapshot_tree(root: &Path) -> Vec<(PathBuf, Option<Vec<u8>>)> {
    let mut out: Vec<_> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            let content = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
            (rel, content)
        })
        .collect();
    out.sort();
    out
}

fn sample_folder() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();
    fs::write(dir.path().join("b.jpg"), b"abcdefghijklmnopqrst").unwrap();
    dir
}

#[tokio::test]
async fn reorganizes_into_subfolders_with_backup() {
    let dir = sample_folder();
    let f = dir.path();
    let organizer = Reorganizer::new(quiet_config());

    let result = organizer
        .apply_request(
            f,
            &[
                FileOperation::new(f.join("a.txt"), f.join("docs/a.txt")),
                FileOperation::new(f.join("b.jpg"), f.join("images/b.jpg")),
            ],
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.applied, 2);
    assert_eq!(fs::metadata(f.join("docs/a.txt")).unwrap().len(), 10);
    assert_eq!(fs::metadata(f.join("images/b.jpg")).unwrap().len(), 20);
    assert!(!f.join("a.txt").exists());
    assert!(!f.join("b.jpg").exists());

    let backup = result.backup_path.unwrap();
    assert!(backup.starts_with(f.join(".quantum_backup")));
    assert_eq!(fs::read(backup.join("a.txt")).unwrap(), b"0123456789");
    assert_eq!(fs::read(backup.join("b.jpg")).unwrap(), b"abcdefghijklmnopqrst");
}

#[tokio::test]
async fn existing_destinations_leave_folder_untouched() {
    let dir = sample_folder();
    let f = dir.path();
    fs::create_dir(f.join("docs")).unwrap();
    fs::write(f.join("docs/a.txt"), b"already here").unwrap();
    fs::write(f.join("b-copy.jpg"), b"taken").unwrap();
    let before = snapshot_tree(f);

    let result = Reorganizer::new(quiet_config())
        .apply_request(
            f,
            &[
                FileOperation::new("a.txt", "docs/a.txt"),
                FileOperation::new("b.jpg", "b-copy.jpg"),
            ],
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.stage, Some(Stage::Validating));
    assert!(result.nothing_touched());
    assert_eq!(snapshot_tree(f), before);
}

#[tokio::test]
async fn restore_round_trip_then_refuses_second_restore() {
    let dir = sample_folder();
    let f = dir.path();
    fs::create_dir(f.join("inbox")).unwrap();
    fs::write(f.join("inbox/c.md"), b"# nested").unwrap();
    let organizer = Reorganizer::new(quiet_config());

    let result = organizer
        .apply_request(
            f,
            &[
                FileOperation::new("a.txt", "docs/a.txt"),
                FileOperation::new("inbox/c.md", "notes/c.md"),
            ],
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert!(!f.join("inbox/c.md").exists());

    let backup = result.backup_path.unwrap();
    let report = organizer.restore_from_backup(&backup).await.unwrap();
    assert_eq!(report.restored.len(), 2);
    assert_eq!(fs::read(f.join("a.txt")).unwrap(), b"0123456789");
    assert_eq!(fs::read(f.join("inbox/c.md")).unwrap(), b"# nested");

    let err = organizer.restore_from_backup(&backup).await.unwrap_err();
    assert!(matches!(
        err,
        RestoreError::Validation(ValidationError::DestinationExists { .. })
    ));
}

#[tokio::test]
async fn restore_latest_uses_newest_apply() {
    let dir = sample_folder();
    let f = dir.path();
    let organizer = Reorganizer::new(quiet_config());

    let first = organizer
        .apply_request(f, &[FileOperation::new("a.txt", "docs/a.txt")])
        .await;
    let second = organizer
        .apply_request(f, &[FileOperation::new("b.jpg", "images/b.jpg")])
        .await;
    assert!(first.success && second.success);

    let report = organizer.restore_latest(f).await.unwrap();
    assert_eq!(Some(report.backup_path), second.backup_path);
    assert!(f.join("b.jpg").exists());
    assert!(!f.join("a.txt").exists());

    let ids = organizer.backups().list_backups(f).await.unwrap();
    assert_eq!(ids.len(), 2);

    let history = organizer.history(f).get_recent(10).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].kind, RequestKind::Restore);
}

#[tokio::test]
async fn scan_excludes_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("only.txt"), b"x").unwrap();

    let contents = Reorganizer::new(quiet_config()).scan(dir.path()).await.unwrap();

    assert_eq!(contents.files.len(), 1);
    assert_eq!(contents.files[0].name, "only.txt");
}

#[tokio::test]
async fn scan_ignores_backup_directory_after_apply() {
    let dir = sample_folder();
    let f = dir.path();
    let organizer = Reorganizer::new(quiet_config());

    let result = organizer
        .apply_request(f, &[FileOperation::new("a.txt", "docs/a.txt")])
        .await;
    assert!(result.success);

    let contents = organizer.scan(f).await.unwrap();
    let names: Vec<_> = contents.files.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["b.jpg"]);
}

#[tokio::test]
async fn plan_suggestions_drive_a_reorganization() {
    let dir = sample_folder();
    let f = dir.path();
    let organizer = Reorganizer::new(quiet_config());

    let plan = PlanAdvisor::new(vec![
        FileChange {
            original_path: PathBuf::from("a.txt"),
            new_path: "documents/a.txt".to_string(),
            reason: "plain text".to_string(),
            tags: vec!["text".to_string()],
        },
        FileChange {
            original_path: PathBuf::from("b.jpg"),
            new_path: "images/photos/b.jpg".to_string(),
            reason: "photo".to_string(),
            tags: vec![],
        },
    ]);

    let contents = organizer.scan(f).await.unwrap();
    let changes = organizer.suggest(Arc::new(plan), contents.files).collect().await;
    let batch = quantum_organizer::advisor::to_batch(&changes).unwrap();

    let result = organizer.apply_request(f, &batch).await;

    assert!(result.success, "{:?}", result.error);
    assert!(f.join("documents/a.txt").exists());
    assert!(f.join("images/photos/b.jpg").exists());
}

#[tokio::test]
async fn nested_destinations_are_rejected_before_backup() {
    let dir = sample_folder();
    let f = dir.path();
    let before = snapshot_tree(f);

    let result = Reorganizer::new(quiet_config())
        .apply_request(
            f,
            &[
                FileOperation::new("a.txt", "docs"),
                FileOperation::new("b.jpg", "docs/b.jpg"),
            ],
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.stage, Some(Stage::Validating));
    assert!(result.backup_path.is_none());
    assert_eq!(snapshot_tree(f), before);
}

/// Two destinations that only collide through a directory symlink pass
/// validation, so the second move fails at execution time.
#[cfg(unix)]
#[tokio::test]
async fn partial_execution_surfaces_backup_and_restores() {
    let dir = sample_folder();
    let f = dir.path();
    fs::create_dir(f.join("real")).unwrap();
    std::os::unix::fs::symlink(f.join("real"), f.join("alias")).unwrap();
    let organizer = Reorganizer::new(quiet_config());

    let result = organizer
        .apply_request(
            f,
            &[
                FileOperation::new("a.txt", "real/a.txt"),
                FileOperation::new("b.jpg", "alias/a.txt"),
            ],
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.stage, Some(Stage::Executing));
    assert!(!result.nothing_touched());
    assert_eq!(result.applied, 1);
    assert!(!f.join("a.txt").exists());
    assert_eq!(fs::read(f.join("real/a.txt")).unwrap(), b"0123456789");
    assert!(f.join("b.jpg").exists());

    let backup = result.backup_path.expect("execution failures keep the backup");
    let report = organizer.restore_from_backup(&backup).await.unwrap();

    assert_eq!(report.restored.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(fs::read(f.join("a.txt")).unwrap(), b"0123456789");
    assert_eq!(fs::read(f.join("b.jpg")).unwrap(), b"abcdefghijklmnopqrst");
}
