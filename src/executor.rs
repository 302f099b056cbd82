// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sequential batch execution
//!
//! Operations run one at a time in batch order. The first failure stops the
//! batch; operations already applied stay applied.

use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::MoveError;
use crate::operation::FileOperation;
use crate::validator::{probe, Existence};

/// How files reach their destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// Rename, falling back to copy + delete across volumes
    #[default]
    Move,
    /// Copy and keep the source
    Copy,
}

/// How a single move was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Renamed,
    CopiedAndRemoved,
    Copied,
}

/// Copy `from` to `to`, then delete `from`. If the copy cannot be completed
/// the partial destination is removed; if the source cannot be deleted the
/// copy is removed again so the file exists in exactly one place.
pub async fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    if let Err(e) = tokio::fs::copy(from, to).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::remove_file(from).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(e);
    }
    Ok(())
}

/// Move a file, preferring an atomic rename
pub async fn move_file(from: &Path, to: &Path) -> io::Result<Transfer> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(Transfer::Renamed),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!("Rename across devices failed for {:?}, copying instead", from);
            copy_then_remove(from, to).await?;
            Ok(Transfer::CopiedAndRemoved)
        }
        Err(e) => Err(e),
    }
}

/// Applies validated batches
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveExecutor {
    mode: TransferMode,
}

impl MoveExecutor {
    pub fn new(mode: TransferMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Apply every operation in order and return how many were applied
    pub async fn apply_changes(&self, batch: &[FileOperation]) -> Result<usize, MoveError> {
        for (index, op) in batch.iter().enumerate() {
            let transfer = self.apply_one(index, op).await?;
            info!(
                "{:?}: {:?} -> {:?}",
                transfer, op.source_path, op.destination_path
            );
        }
        Ok(batch.len())
    }

    async fn apply_one(&self, index: usize, op: &FileOperation) -> Result<Transfer, MoveError> {
        if !op.is_well_formed() {
            return Err(MoveError::InvalidOperation { index });
        }

        let from = op.source_path.as_path();
        let to = op.destination_path.as_path();
        let failed = |source| MoveError::MoveFailed {
            index,
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };

        match probe(from).await {
            Existence::Exists => {}
            Existence::NotExists => {
                return Err(MoveError::SourceMissing {
                    index,
                    path: from.to_path_buf(),
                })
            }
            Existence::Unknown(kind) => return Err(failed(io::Error::from(kind))),
        }

        // The destination may have appeared since validation.
        match probe(to).await {
            Existence::NotExists => {}
            Existence::Exists => {
                return Err(failed(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "destination appeared after validation",
                )))
            }
            Existence::Unknown(kind) => return Err(failed(io::Error::from(kind))),
        }

        if let Some(parent) = to.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| MoveError::CreateDir {
                        index,
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        debug!("Operation {}: {:?} ({:?})", index, from, self.mode);

        match self.mode {
            TransferMode::Move => move_file(from, to).await.map_err(failed),
            TransferMode::Copy => tokio::fs::copy(from, to)
                .await
                .map(|_| Transfer::Copied)
                .map_err(failed),
        }
    }
}
