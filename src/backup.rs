// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Pre-move backup snapshots
//!
//! Layout: `<folder>/<dir_name>/<id>/<path relative to folder>`. Snapshots are
//! never modified after creation and never pruned.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::BackupConfig;
use crate::error::BackupError;
use crate::operation::FileOperation;
use crate::validator::normalize;

/// One file captured in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub original_relative_path: PathBuf,
    pub backup_path: PathBuf,
}

/// A completed backup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub id: String,
    pub backup_root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub copied_files: Vec<BackupEntry>,
}

/// Build a backup id: an ISO-8601 timestamp made filename-safe, plus a random
/// suffix so two backups in the same millisecond do not collide.
pub fn backup_id(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", stamp, &suffix[..8])
}

/// Creates and locates backup snapshots
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir_name: String,
}

impl Default for BackupManager {
    fn default() -> Self {
        Self::new(&BackupConfig::default())
    }
}

impl BackupManager {
    pub fn new(config: &BackupConfig) -> Self {
        Self {
            dir_name: config.dir_name.clone(),
        }
    }

    /// Directory holding every snapshot of `folder_root`
    pub fn backup_dir(&self, folder_root: &Path) -> PathBuf {
        folder_root.join(&self.dir_name)
    }

    pub fn backup_path(&self, folder_root: &Path, id: &str) -> PathBuf {
        self.backup_dir(folder_root).join(id)
    }

    /// The live folder a snapshot belongs to, if `backup_path` has the
    /// `<folder>/<dir_name>/<id>` shape
    pub fn folder_root_of(&self, backup_path: &Path) -> Option<PathBuf> {
        let backup_path = normalize(backup_path);
        let container = backup_path.parent()?;
        if container.file_name()? != self.dir_name.as_str() {
            return None;
        }
        container.parent().map(Path::to_path_buf)
    }

    /// Copy every source in `batch` into a fresh snapshot directory.
    ///
    /// A failed copy leaves whatever was already written in place and is
    /// reported as an error.
    pub async fn create_backup(
        &self,
        folder_root: &Path,
        batch: &[FileOperation],
    ) -> Result<BackupSnapshot, BackupError> {
        let created_at = Utc::now();
        let id = backup_id(created_at);
        let backup_root = self.backup_path(folder_root, &id);

        tokio::fs::create_dir_all(&backup_root)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: backup_root.clone(),
                source,
            })?;

        let root = normalize(folder_root);
        let mut copied_files = Vec::with_capacity(batch.len());

        for op in batch {
            let source_path = normalize(&op.source_path);
            let relative = source_path
                .strip_prefix(&root)
                .map_err(|_| BackupError::OutsideRoot {
                    path: source_path.clone(),
                    root: root.clone(),
                })?
                .to_path_buf();
            let backup_path = backup_root.join(&relative);

            if let Some(parent) = backup_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| BackupError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }

            tokio::fs::copy(&source_path, &backup_path)
                .await
                .map_err(|source| BackupError::Write {
                    source_path: source_path.clone(),
                    backup_path: backup_path.clone(),
                    source,
                })?;
            debug!("Backed up {:?} -> {:?}", source_path, backup_path);

            copied_files.push(BackupEntry {
                original_relative_path: relative,
                backup_path,
            });
        }

        info!("Created backup {:?} ({} files)", backup_root, copied_files.len());

        Ok(BackupSnapshot {
            id,
            backup_root,
            created_at,
            copied_files,
        })
    }

    /// Snapshot ids for `folder_root`, oldest first
    pub async fn list_backups(&self, folder_root: &Path) -> Result<Vec<String>, BackupError> {
        let dir = self.backup_dir(folder_root);
        let list_err = |source| BackupError::List {
            path: dir.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(list_err(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            if entry.file_type().await.map_err(list_err)?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
