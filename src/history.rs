// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Request journal for history and restore-latest support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::operation::FileOperation;
use crate::reorganizer::Stage;
use crate::Result;

/// What kind of request an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Apply,
    Restore,
}

/// Final state of a recorded request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { applied: usize },
    Failed { stage: Stage, applied: usize, error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// One journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: RequestKind,
    pub folder_root: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub operations: Vec<FileOperation>,
    pub outcome: Outcome,
}

/// Append-only JSONL journal
pub struct History {
    path: PathBuf,
}

impl History {
    /// Create a new history manager
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append an entry to the history
    pub async fn append(&self, entry: &HistoryEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Read all history entries, oldest first
    pub async fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub async fn get_recent(&self, count: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.read_all().await?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Backup of the newest apply request that produced one
    pub async fn latest_backup(&self) -> Result<Option<PathBuf>> {
        let entries = self.read_all().await?;
        Ok(entries
            .into_iter()
            .rev()
            .filter(|e| e.kind == RequestKind::Apply)
            .find_map(|e| e.backup_path))
    }

    /// Get history file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create a new history entry stamped with the current time
pub fn create_entry(
    kind: RequestKind,
    folder_root: PathBuf,
    backup_path: Option<PathBuf>,
    operations: Vec<FileOperation>,
    outcome: Outcome,
) -> HistoryEntry {
    HistoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        kind,
        folder_root,
        backup_path,
        operations,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: RequestKind, backup: Option<&str>) -> HistoryEntry {
        create_entry(
            kind,
            PathBuf::from("/f"),
            backup.map(PathBuf::from),
            vec![FileOperation::new("/f/a", "/f/d/a")],
            Outcome::Succeeded { applied: 1 },
        )
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join(".quantum_backup/history.jsonl"));

        history.append(&entry(RequestKind::Apply, Some("/f/.quantum_backup/1"))).await.unwrap();
        history.append(&entry(RequestKind::Restore, None)).await.unwrap();

        let all = history.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].operations[0].destination_path, PathBuf::from("/f/d/a"));

        let recent = history.get_recent(1).await.unwrap();
        assert_eq!(recent[0].kind, RequestKind::Restore);
    }

    #[tokio::test]
    async fn test_latest_backup_skips_restores() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));

        history.append(&entry(RequestKind::Apply, Some("/b/1"))).await.unwrap();
        history.append(&entry(RequestKind::Apply, Some("/b/2"))).await.unwrap();
        history.append(&entry(RequestKind::Restore, Some("/b/2"))).await.unwrap();
        history.append(&entry(RequestKind::Apply, None)).await.unwrap();

        assert_eq!(history.latest_backup().await.unwrap(), Some(PathBuf::from("/b/2")));
    }

    #[tokio::test]
    async fn test_missing_file_and_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("history.jsonl"));
        assert!(history.read_all().await.unwrap().is_empty());

        std::fs::write(history.path(), "not json\n\n").unwrap();
        history.append(&entry(RequestKind::Apply, None)).await.unwrap();
        assert_eq!(history.read_all().await.unwrap().len(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let failed = Outcome::Failed {
            stage: Stage::Executing,
            applied: 2,
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "executing");
        assert!(!failed.is_success());
    }
}
