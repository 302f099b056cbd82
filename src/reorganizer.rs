// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Reorganization pipeline: validate, back up, execute
//!
//! Each request moves through `Idle → Validating → BackingUp → Executing` and
//! ends in `Succeeded` or `Failed`. A failing stage skips every later stage.
//! Requests against the same folder are serialized.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::advisor::{stream_changes, ChangeAdvisor, ChangeStream};
use crate::backup::{BackupManager, BackupSnapshot};
use crate::config::AppConfig;
use crate::error::{ApplyError, RestoreError, ScanError, ValidationError};
use crate::executor::{MoveExecutor, TransferMode};
use crate::history::{create_entry, History, HistoryEntry, Outcome, RequestKind};
use crate::operation::FileOperation;
use crate::scanner::{FileDescriptor, FolderContents, FolderScanner};
use crate::validator::{normalize, PathValidator};

/// Pipeline stage of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Validating,
    BackingUp,
    Executing,
    Succeeded,
    Failed,
}

/// Terminal, serializable outcome of one apply request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stage that failed; absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Operations that reached their destination
    pub applied: usize,
}

impl ApplyResult {
    fn succeeded(snapshot: &BackupSnapshot, applied: usize) -> Self {
        Self {
            success: true,
            backup_path: Some(snapshot.backup_root.clone()),
            error: None,
            stage: None,
            applied,
        }
    }

    fn failed(err: &ApplyError) -> Self {
        let applied = match err {
            ApplyError::Execution { source, .. } => source.index(),
            _ => 0,
        };
        Self {
            success: false,
            backup_path: err.backup_path().cloned(),
            error: Some(err.to_string()),
            stage: Some(err.stage()),
            applied,
        }
    }

    /// True when the request failed before anything on disk changed
    pub fn nothing_touched(&self) -> bool {
        self.stage == Some(Stage::Validating)
    }
}

/// A completed restore
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub backup_path: PathBuf,
    pub folder_root: PathBuf,
    pub restored: Vec<FileOperation>,
    /// Snapshot files whose original was already in place with the same content
    #[serde(default)]
    pub skipped: Vec<FileOperation>,
}

/// One async mutex per folder root. Entries live only while a request for
/// that folder holds or waits on the lock.
#[derive(Default)]
struct FolderLocks {
    inner: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

struct FolderGuard<'a> {
    locks: &'a FolderLocks,
    key: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FolderGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.key);
        }
    }
}

impl FolderLocks {
    async fn acquire(&self, folder_root: &Path) -> FolderGuard<'_> {
        let key = match tokio::fs::canonicalize(folder_root).await {
            Ok(path) => path,
            Err(_) => normalize(folder_root),
        };
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(key.clone()).or_default().clone()
        };
        FolderGuard {
            locks: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// True when `original` is a regular file with exactly the bytes of `snapshot`
async fn already_restored(snapshot: &Path, original: &Path) -> bool {
    let (Ok(a), Ok(b)) = (
        tokio::fs::symlink_metadata(snapshot).await,
        tokio::fs::symlink_metadata(original).await,
    ) else {
        return false;
    };
    if !b.is_file() || a.len() != b.len() {
        return false;
    }
    match (tokio::fs::read(snapshot).await, tokio::fs::read(original).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("Stage {:?} -> {:?}", stage, next);
    *stage = next;
}

/// Runs reorganization and restore requests
pub struct Reorganizer {
    config: AppConfig,
    scanner: FolderScanner,
    backups: BackupManager,
    locks: FolderLocks,
}

impl Reorganizer {
    pub fn new(config: AppConfig) -> Self {
        Self {
            scanner: FolderScanner::new(&config.scan),
            backups: BackupManager::new(&config.backup),
            locks: FolderLocks::default(),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Journal for `folder_root`
    pub fn history(&self, folder_root: &Path) -> History {
        History::new(
            self.backups
                .backup_dir(folder_root)
                .join(&self.config.backup.journal_file),
        )
    }

    /// Scan the direct-child files of `folder`
    pub async fn scan(&self, folder: &Path) -> Result<FolderContents, ScanError> {
        self.scanner.scan(folder).await
    }

    /// Stream advisor suggestions for scanned files
    pub fn suggest(&self, advisor: Arc<dyn ChangeAdvisor>, files: Vec<FileDescriptor>) -> ChangeStream {
        stream_changes(advisor, files, &self.config.suggestions)
    }

    /// Apply a batch and report a boundary-friendly result
    pub async fn apply_request(&self, folder_root: &Path, batch: &[FileOperation]) -> ApplyResult {
        match self.execute(folder_root, batch).await {
            Ok((snapshot, applied)) => ApplyResult::succeeded(&snapshot, applied),
            Err(err) => ApplyResult::failed(&err),
        }
    }

    /// Apply a batch, returning the snapshot and applied count or the
    /// stage-annotated failure. Relative paths resolve against `folder_root`.
    pub async fn execute(
        &self,
        folder_root: &Path,
        batch: &[FileOperation],
    ) -> Result<(BackupSnapshot, usize), ApplyError> {
        let _guard = self.locks.acquire(folder_root).await;
        let batch: Vec<FileOperation> = batch
            .iter()
            .map(|op| op.resolved_against(folder_root))
            .collect();

        let mut stage = Stage::Idle;

        advance(&mut stage, Stage::Validating);
        let validator =
            PathValidator::with_root(folder_root).reserving(self.backups.backup_dir(folder_root));
        let report = match validator.validate(&batch).await {
            Ok(report) => report,
            Err(e) => {
                advance(&mut stage, Stage::Failed);
                warn!("Validation failed for {:?}: {}", folder_root, e);
                return Err(e.into());
            }
        };
        info!(
            "Validated {} operations in {:?} ({} new directories)",
            report.operations,
            folder_root,
            report.directories_to_create.len()
        );

        advance(&mut stage, Stage::BackingUp);
        let snapshot = match self.backups.create_backup(folder_root, &batch).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                advance(&mut stage, Stage::Failed);
                error!("Backup failed for {:?}: {}", folder_root, e);
                let err = ApplyError::from(e);
                self.record(folder_root, RequestKind::Apply, None, batch, &err).await;
                return Err(err);
            }
        };

        advance(&mut stage, Stage::Executing);
        match MoveExecutor::default().apply_changes(&batch).await {
            Ok(applied) => {
                advance(&mut stage, Stage::Succeeded);
                info!(
                    "Reorganized {} files in {:?}, backup at {:?}",
                    applied, folder_root, snapshot.backup_root
                );
                self.journal(create_entry(
                    RequestKind::Apply,
                    folder_root.to_path_buf(),
                    Some(snapshot.backup_root.clone()),
                    batch,
                    Outcome::Succeeded { applied },
                ))
                .await;
                Ok((snapshot, applied))
            }
            Err(source) => {
                advance(&mut stage, Stage::Failed);
                error!(
                    "Execution stopped after {} of {} operations: {}. Backup at {:?}",
                    source.index(),
                    batch.len(),
                    source,
                    snapshot.backup_root
                );
                let err = ApplyError::Execution {
                    backup_path: snapshot.backup_root.clone(),
                    source,
                };
                self.record(
                    folder_root,
                    RequestKind::Apply,
                    Some(snapshot.backup_root),
                    batch,
                    &err,
                )
                .await;
                Err(err)
            }
        }
    }

    async fn record(
        &self,
        folder_root: &Path,
        kind: RequestKind,
        backup_path: Option<PathBuf>,
        operations: Vec<FileOperation>,
        err: &ApplyError,
    ) {
        let applied = match err {
            ApplyError::Execution { source, .. } => source.index(),
            _ => 0,
        };
        self.journal(create_entry(
            kind,
            folder_root.to_path_buf(),
            backup_path,
            operations,
            Outcome::Failed {
                stage: err.stage(),
                applied,
                error: err.to_string(),
            },
        ))
        .await;
    }

    async fn journal(&self, entry: HistoryEntry) {
        let history = self.history(&entry.folder_root);
        if let Err(e) = history.append(&entry).await {
            warn!("Failed to write history to {:?}: {}", history.path(), e);
        }
    }

    /// Copy every file of a snapshot back to its original location.
    ///
    /// Originals that are already in place with identical content are skipped,
    /// so a snapshot left by a partially executed batch restores only what
    /// moved. An original that exists with different content, or a snapshot
    /// with nothing left to restore, fails validation with
    /// `DestinationExists`. The snapshot itself is left untouched.
    pub async fn restore_from_backup(&self, backup_path: &Path) -> Result<RestoreReport, RestoreError> {
        let backup_path = normalize(backup_path);
        match tokio::fs::metadata(&backup_path).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(RestoreError::BackupMissing(backup_path)),
        }
        let folder_root = self
            .backups
            .folder_root_of(&backup_path)
            .ok_or_else(|| RestoreError::NotABackup(backup_path.clone()))?;

        let _guard = self.locks.acquire(&folder_root).await;

        let contents = self.scanner.scan_recursive(&backup_path).await?;
        if contents.files.is_empty() {
            return Err(RestoreError::EmptyBackup(backup_path));
        }

        let mut operations = Vec::with_capacity(contents.files.len());
        let mut skipped = Vec::new();
        for file in contents.files {
            let Ok(relative) = file.path.strip_prefix(&backup_path) else {
                continue;
            };
            let original = folder_root.join(relative);
            let op = FileOperation::new(file.path, original);
            if already_restored(&op.source_path, &op.destination_path).await {
                debug!("{:?} is already in place", op.destination_path);
                skipped.push(op);
            } else {
                operations.push(op);
            }
        }

        if operations.is_empty() {
            let path = skipped
                .first()
                .map(|op| op.destination_path.clone())
                .unwrap_or_else(|| folder_root.clone());
            return Err(ValidationError::DestinationExists { index: 0, path }.into());
        }
        if !skipped.is_empty() {
            info!("{} files of {:?} are already in place", skipped.len(), backup_path);
        }

        PathValidator::with_root(&folder_root)
            .reserving(self.backups.backup_dir(&folder_root))
            .copying_sources()
            .validate(&operations)
            .await?;

        info!("Restoring {} files from {:?}", operations.len(), backup_path);
        let outcome = MoveExecutor::new(TransferMode::Copy)
            .apply_changes(&operations)
            .await;

        let (result, journal_outcome) = match outcome {
            Ok(applied) => (Ok(applied), Outcome::Succeeded { applied }),
            Err(source) => {
                let applied = source.index();
                error!("Restore stopped after {} files: {}", applied, source);
                let message = source.to_string();
                (
                    Err(RestoreError::Move { applied, source }),
                    Outcome::Failed {
                        stage: Stage::Executing,
                        applied,
                        error: message,
                    },
                )
            }
        };

        self.journal(create_entry(
            RequestKind::Restore,
            folder_root.clone(),
            Some(backup_path.clone()),
            operations.clone(),
            journal_outcome,
        ))
        .await;

        result?;
        Ok(RestoreReport {
            backup_path,
            folder_root,
            restored: operations,
            skipped,
        })
    }

    /// Restore the newest snapshot of `folder_root`
    pub async fn restore_latest(&self, folder_root: &Path) -> Result<RestoreReport, RestoreError> {
        let from_history = match self.history(folder_root).latest_backup().await {
            Ok(path) => path,
            Err(e) => {
                warn!("Ignoring unreadable history: {}", e);
                None
            }
        };

        let backup_path = match from_history {
            Some(path) => path,
            None => {
                let ids = self.backups.list_backups(folder_root).await?;
                let id = ids
                    .last()
                    .ok_or_else(|| RestoreError::NoBackups(folder_root.to_path_buf()))?;
                self.backups.backup_path(folder_root, id)
            }
        };

        self.restore_from_backup(&backup_path).await
    }
}
