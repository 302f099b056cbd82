// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for the reorganization engine
//!
//! Each component reports its own typed failure. [`ApplyError`] wraps them
//! with the pipeline stage that produced them so callers can tell
//! "nothing touched" apart from "backup exists, moves may be partial".

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::reorganizer::Stage;

/// Result type alias for crate-level operations
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Crate-level error type
#[derive(Error, Debug)]
pub enum OrganizerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Suggestion error: {0}")]
    Suggestion(#[from] SuggestionError),

    #[error("Reorganization failed: {0}")]
    Apply(#[from] ApplyError),

    #[error("Restore failed: {0}")]
    Restore(#[from] RestoreError),
}

/// Batch validation failures. `index` is the operation's position in the batch.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Batch is empty")]
    EmptyBatch,

    #[error("Operation {index}: {reason}")]
    InvalidOperation { index: usize, reason: String },

    #[error("Operation {index}: {path:?} is already used by operation {first}")]
    DuplicatePath {
        index: usize,
        first: usize,
        path: PathBuf,
    },

    #[error("Operation {index}: {path:?} is nested with a path of operation {other}")]
    ConflictingPaths {
        index: usize,
        other: usize,
        path: PathBuf,
    },

    #[error("Operation {index}: {path:?} is inside the backup directory {dir:?}")]
    Reserved {
        index: usize,
        path: PathBuf,
        dir: PathBuf,
    },

    #[error("Operation {index}: {path:?} is outside folder root {root:?}")]
    OutsideRoot {
        index: usize,
        path: PathBuf,
        root: PathBuf,
    },

    #[error("Operation {index}: source does not exist: {path:?}")]
    SourceMissing { index: usize, path: PathBuf },

    #[error("Operation {index}: destination already exists: {path:?}")]
    DestinationExists { index: usize, path: PathBuf },

    #[error("Operation {index}: destination parent is not a directory: {path:?}")]
    ParentNotDirectory { index: usize, path: PathBuf },

    #[error("Operation {index}: cannot probe {path:?} ({kind})")]
    Inaccessible {
        index: usize,
        path: PathBuf,
        kind: io::ErrorKind,
    },
}

/// Backup snapshot failures
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to create backup directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to back up {source_path:?} to {backup_path:?}: {source}")]
    Write {
        source_path: PathBuf,
        backup_path: PathBuf,
        source: io::Error,
    },

    #[error("{path:?} is not inside folder root {root:?}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Failed to list backups in {path:?}: {source}")]
    List { path: PathBuf, source: io::Error },
}

/// Move execution failures. `index` is also the number of operations applied
/// before the failure.
#[derive(Error, Debug)]
pub enum MoveError {
    #[error("Operation {index}: invalid source or destination path")]
    InvalidOperation { index: usize },

    #[error("Operation {index}: source vanished before it could be moved: {path:?}")]
    SourceMissing { index: usize, path: PathBuf },

    #[error("Operation {index}: failed to create directory {path:?}: {source}")]
    CreateDir {
        index: usize,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Operation {index}: failed to move {from:?} to {to:?}: {source}")]
    MoveFailed {
        index: usize,
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

impl MoveError {
    /// Position of the failing operation in its batch
    pub fn index(&self) -> usize {
        match self {
            Self::InvalidOperation { index }
            | Self::SourceMissing { index, .. }
            | Self::CreateDir { index, .. }
            | Self::MoveFailed { index, .. } => *index,
        }
    }
}

/// Folder scan failures
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to scan folder {path:?}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("Failed to read metadata for {path:?}: {source}")]
    Metadata { path: PathBuf, source: io::Error },

    #[error("Failed to read file {path:?}: {source}")]
    ReadFile { path: PathBuf, source: io::Error },
}

/// Restore failures
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Backup not found: {0:?}")]
    BackupMissing(PathBuf),

    #[error("{0:?} is not a backup directory")]
    NotABackup(PathBuf),

    #[error("Backup {0:?} contains no files")]
    EmptyBackup(PathBuf),

    #[error("No backups recorded for {0:?}")]
    NoBackups(PathBuf),

    #[error("Failed to read backup: {0}")]
    Scan(#[from] ScanError),

    #[error("Failed to list backups: {0}")]
    Backup(#[from] BackupError),

    #[error("Restore validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Restore interrupted after {applied} file(s): {source}")]
    Move { applied: usize, source: MoveError },
}

/// Failures turning an advisor suggestion into a file operation
#[derive(Error, Debug)]
pub enum SuggestionError {
    #[error("Suggested path for {original:?} is empty")]
    EmptyPath { original: PathBuf },

    #[error("Suggested path {new_path:?} for {original:?} escapes its folder")]
    Escapes { original: PathBuf, new_path: String },

    #[error("{0:?} has no parent directory")]
    NoParent(PathBuf),

    #[error("Advisor {advisor} failed on {path:?}: {message}")]
    Advisor {
        advisor: &'static str,
        path: PathBuf,
        message: String,
    },
}

/// A pipeline failure, annotated with the stage that produced it
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("Execution failed (backup at {backup_path:?}): {source}")]
    Execution {
        backup_path: PathBuf,
        source: MoveError,
    },
}

impl ApplyError {
    /// Stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation(_) => Stage::Validating,
            Self::Backup(_) => Stage::BackingUp,
            Self::Execution { .. } => Stage::Executing,
        }
    }

    /// True when no filesystem mutation happened (validation failure)
    pub fn nothing_touched(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Backup directory left behind by this failure, if any
    pub fn backup_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Execution { backup_path, .. } => Some(backup_path),
            _ => None,
        }
    }
}
