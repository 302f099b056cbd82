// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Folder scanning into file descriptors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::ScanError;

/// Snapshot of one file at scan time. Goes stale if the file changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Lowercased extension with its leading dot, empty when there is none
    #[serde(rename = "type")]
    pub file_type: String,
    pub last_modified: DateTime<Utc>,
}

/// Result of scanning a folder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderContents {
    pub folder_path: PathBuf,
    pub files: Vec<FileDescriptor>,
}

impl FolderContents {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Lowercased extension of `path` including the dot
pub fn file_type_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

fn descriptor(path: PathBuf, metadata: &Metadata) -> FileDescriptor {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let last_modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);

    FileDescriptor {
        file_type: file_type_of(&path),
        name,
        size: metadata.len(),
        last_modified,
        path,
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Read-only folder scanner
#[derive(Debug, Clone)]
pub struct FolderScanner {
    include_hidden: bool,
}

impl Default for FolderScanner {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

impl FolderScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            include_hidden: config.include_hidden,
        }
    }

    /// List the direct-child files of `folder`. Directories are skipped and
    /// nothing is recursed into. Any failure fails the whole scan.
    pub async fn scan(&self, folder: &Path) -> Result<FolderContents, ScanError> {
        let read_dir_err = |source| ScanError::ReadDir {
            path: folder.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(folder).await.map_err(read_dir_err)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|source| ScanError::Metadata {
                path: path.clone(),
                source,
            })?;
            if !file_type.is_file() {
                continue;
            }
            if !self.include_hidden && is_hidden(&path) {
                continue;
            }

            let metadata = entry.metadata().await.map_err(|source| ScanError::Metadata {
                path: path.clone(),
                source,
            })?;
            files.push(descriptor(path, &metadata));
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Scanned {:?}: {} files", folder, files.len());

        Ok(FolderContents {
            folder_path: folder.to_path_buf(),
            files,
        })
    }

    /// List every file under `folder` at any depth, ordered by path.
    /// Hidden-file filtering does not apply; this is used to read snapshots.
    pub async fn scan_recursive(&self, folder: &Path) -> Result<FolderContents, ScanError> {
        let root = folder.to_path_buf();
        let files = tokio::task::spawn_blocking(move || -> Result<Vec<FileDescriptor>, ScanError> {
            let mut files = Vec::new();
            for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(&root).to_path_buf();
                    ScanError::ReadDir {
                        path,
                        source: e.into(),
                    }
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let metadata = entry.metadata().map_err(|e| ScanError::Metadata {
                    path: entry.path().to_path_buf(),
                    source: e.into(),
                })?;
                files.push(descriptor(entry.into_path(), &metadata));
            }
            Ok(files)
        })
        .await
        .map_err(|e| ScanError::ReadDir {
            path: folder.to_path_buf(),
            source: std::io::Error::other(e),
        })??;

        Ok(FolderContents {
            folder_path: folder.to_path_buf(),
            files,
        })
    }

    /// Descriptor for a single file
    pub async fn describe(&self, path: &Path) -> Result<FileDescriptor, ScanError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|source| ScanError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(descriptor(path.to_path_buf(), &metadata))
    }

    /// Raw bytes of a file, for handing to an advisor
    pub async fn read_content(&self, path: &Path) -> Result<Vec<u8>, ScanError> {
        tokio::fs::read(path).await.map_err(|source| ScanError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
    }
}
