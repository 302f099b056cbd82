// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Seam for the external AI advisor that proposes new locations
//!
//! Suggestions are produced one at a time on a background task and handed
//! over a bounded channel. The consumer may stop at any point; the producer
//! notices the closed channel and ends without asking for more suggestions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SuggestionConfig;
use crate::error::SuggestionError;
use crate::operation::{Batch, FileOperation};
use crate::scanner::FileDescriptor;
use crate::Result;

/// A proposed new location for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub original_path: PathBuf,
    /// Relative to the directory that contains `original_path`
    pub new_path: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FileChange {
    /// Turn the suggestion into a move. `new_path` must stay inside the
    /// original file's directory.
    pub fn to_operation(&self) -> std::result::Result<FileOperation, SuggestionError> {
        let relative = Path::new(self.new_path.trim());
        let mut has_name = false;

        for component in relative.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(SuggestionError::Escapes {
                        original: self.original_path.clone(),
                        new_path: self.new_path.clone(),
                    })
                }
            }
        }
        if !has_name {
            return Err(SuggestionError::EmptyPath {
                original: self.original_path.clone(),
            });
        }

        let parent = self
            .original_path
            .parent()
            .ok_or_else(|| SuggestionError::NoParent(self.original_path.clone()))?;

        Ok(FileOperation::new(
            self.original_path.clone(),
            parent.join(relative),
        ))
    }
}

/// Convert suggestions into a batch, failing on the first bad one
pub fn to_batch(changes: &[FileChange]) -> std::result::Result<Batch, SuggestionError> {
    changes.iter().map(FileChange::to_operation).collect()
}

/// Something that can propose where a file belongs
#[async_trait]
pub trait ChangeAdvisor: Send + Sync {
    /// Name of this advisor
    fn name(&self) -> &'static str;

    /// Suggest a new location for `file`, or `None` to leave it alone
    async fn suggest(
        &self,
        file: &FileDescriptor,
    ) -> std::result::Result<Option<FileChange>, SuggestionError>;
}

/// Receiving end of a suggestion stream
pub struct ChangeStream {
    rx: mpsc::Receiver<FileChange>,
    producer: JoinHandle<usize>,
}

impl ChangeStream {
    /// Next suggestion, or `None` once the producer is done
    pub async fn next(&mut self) -> Option<FileChange> {
        self.rx.recv().await
    }

    /// Stop early. No further suggestions are requested.
    pub fn cancel(self) {
        self.producer.abort();
    }

    /// Drain every remaining suggestion
    pub async fn collect(mut self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        while let Some(change) = self.next().await {
            changes.push(change);
        }
        changes
    }
}

/// Ask `advisor` about each file in order, yielding suggestions as they come.
/// Files the advisor fails on are logged and skipped.
pub fn stream_changes(
    advisor: Arc<dyn ChangeAdvisor>,
    files: Vec<FileDescriptor>,
    config: &SuggestionConfig,
) -> ChangeStream {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let delay = config.inter_item_delay();

    let producer = tokio::spawn(async move {
        let mut sent = 0;
        let total = files.len();

        for (i, file) in files.iter().enumerate() {
            if tx.is_closed() {
                debug!("Suggestion consumer went away after {} of {}", i, total);
                break;
            }

            match advisor.suggest(file).await {
                Ok(Some(change)) => {
                    if tx.send(change).await.is_err() {
                        break;
                    }
                    sent += 1;
                }
                Ok(None) => debug!("{}: no suggestion for {:?}", advisor.name(), file.path),
                Err(e) => warn!("{}: skipping {:?}: {}", advisor.name(), file.path, e),
            }

            if !delay.is_zero() && i + 1 < total {
                tokio::time::sleep(delay).await;
            }
        }

        info!("{} produced {} suggestions for {} files", advisor.name(), sent, total);
        sent
    });

    ChangeStream { rx, producer }
}

/// Serves suggestions prepared ahead of time, e.g. exported from the AI
/// service as a JSON array of [`FileChange`]
#[derive(Debug, Default)]
pub struct PlanAdvisor {
    changes: HashMap<PathBuf, FileChange>,
}

impl PlanAdvisor {
    pub fn new(changes: Vec<FileChange>) -> Self {
        Self {
            changes: changes
                .into_iter()
                .map(|c| (c.original_path.clone(), c))
                .collect(),
        }
    }

    /// Load a plan file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let changes: Vec<FileChange> = serde_json::from_str(&content)?;
        Ok(Self::new(changes))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[async_trait]
impl ChangeAdvisor for PlanAdvisor {
    fn name(&self) -> &'static str {
        "plan"
    }

    async fn suggest(
        &self,
        file: &FileDescriptor,
    ) -> std::result::Result<Option<FileChange>, SuggestionError> {
        // Plans may key entries by full path or by bare file name.
        let found = self
            .changes
            .get(&file.path)
            .or_else(|| self.changes.get(Path::new(&file.name)));

        Ok(found.map(|change| FileChange {
            original_path: file.path.clone(),
            ..change.clone()
        }))
    }
}
