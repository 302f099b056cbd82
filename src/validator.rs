// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch validation and filesystem existence probes
//!
//! Validation never writes to the filesystem. Missing destination parents are
//! reported back so the executor can create them.

use std::collections::HashMap;
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::operation::FileOperation;

/// Outcome of an existence query. A failed probe is `Unknown`, never a
/// stand-in for `NotExists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    NotExists,
    Unknown(io::ErrorKind),
}

async fn stat(path: &Path, follow_links: bool) -> Result<Option<Metadata>, io::ErrorKind> {
    let result = if follow_links {
        tokio::fs::metadata(path).await
    } else {
        tokio::fs::symlink_metadata(path).await
    };
    match result {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.kind()),
    }
}

/// Probe `path` without following a final symlink
pub async fn probe(path: &Path) -> Existence {
    match stat(path, false).await {
        Ok(Some(_)) => Existence::Exists,
        Ok(None) => Existence::NotExists,
        Err(kind) => Existence::Unknown(kind),
    }
}

/// Lexically normalize a path, folding `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// What validation learned about a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Number of operations checked
    pub operations: usize,
    /// Destination parents that execution will have to create
    pub directories_to_create: Vec<PathBuf>,
    /// Existing destination parents that report read-only permissions
    pub unwritable_parents: Vec<PathBuf>,
}

/// Checks batches for well-formedness before anything is touched
#[derive(Debug, Clone, Default)]
pub struct PathValidator {
    root: Option<PathBuf>,
    reserved: Option<PathBuf>,
    sources_read_only: bool,
}

impl PathValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also require every path to lie under `root`
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: Some(normalize(root.as_ref())),
            ..Self::default()
        }
    }

    /// Refuse any path at or below `dir`
    pub fn reserving(mut self, dir: impl AsRef<Path>) -> Self {
        self.reserved = Some(normalize(dir.as_ref()));
        self
    }

    /// Sources are only read, never moved, so they may live in the reserved
    /// directory
    pub fn copying_sources(mut self) -> Self {
        self.sources_read_only = true;
        self
    }

    fn check_not_reserved(&self, index: usize, path: &Path) -> Result<(), ValidationError> {
        match &self.reserved {
            Some(dir) if path.starts_with(dir) => Err(ValidationError::Reserved {
                index,
                path: path.to_path_buf(),
                dir: dir.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn check_inside_root(&self, index: usize, path: &Path) -> Result<(), ValidationError> {
        match &self.root {
            Some(root) if !(path.starts_with(root) && path != root) => {
                Err(ValidationError::OutsideRoot {
                    index,
                    path: path.to_path_buf(),
                    root: root.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Validate a whole batch. The first failing operation fails the batch.
    pub async fn validate(&self, batch: &[FileOperation]) -> Result<ValidationReport, ValidationError> {
        if batch.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }

        let mut report = ValidationReport {
            operations: batch.len(),
            ..ValidationReport::default()
        };
        let mut sources: HashMap<PathBuf, usize> = HashMap::new();
        let mut destinations: HashMap<PathBuf, usize> = HashMap::new();

        for (index, op) in batch.iter().enumerate() {
            if !op.is_well_formed() {
                return Err(ValidationError::InvalidOperation {
                    index,
                    reason: "source and destination must both be non-empty".to_string(),
                });
            }

            let source = normalize(&op.source_path);
            let destination = normalize(&op.destination_path);

            if source == destination {
                return Err(ValidationError::InvalidOperation {
                    index,
                    reason: format!("source and destination are both {:?}", source),
                });
            }

            self.check_inside_root(index, &source)?;
            self.check_inside_root(index, &destination)?;
            if !self.sources_read_only {
                self.check_not_reserved(index, &source)?;
            }
            self.check_not_reserved(index, &destination)?;

            if let Some(&first) = sources.get(&source) {
                return Err(ValidationError::DuplicatePath { index, first, path: source });
            }
            if let Some(&first) = destinations.get(&destination) {
                return Err(ValidationError::DuplicatePath { index, first, path: destination });
            }
            check_nesting(index, &source, &destination, &sources, &destinations)?;

            self.check_source(index, &source).await?;
            self.check_destination(index, &destination, &mut report).await?;

            sources.insert(source, index);
            destinations.insert(destination, index);
        }

        debug!(
            "Validated {} operations ({} directories to create)",
            report.operations,
            report.directories_to_create.len()
        );
        Ok(report)
    }

    async fn check_source(&self, index: usize, source: &Path) -> Result<(), ValidationError> {
        match stat(source, true).await {
            Ok(Some(metadata)) if metadata.is_file() => Ok(()),
            Ok(Some(_)) => Err(ValidationError::InvalidOperation {
                index,
                reason: format!("source {:?} is not a regular file", source),
            }),
            Ok(None) => Err(ValidationError::SourceMissing {
                index,
                path: source.to_path_buf(),
            }),
            Err(kind) => Err(ValidationError::Inaccessible {
                index,
                path: source.to_path_buf(),
                kind,
            }),
        }
    }

    async fn check_destination(
        &self,
        index: usize,
        destination: &Path,
        report: &mut ValidationReport,
    ) -> Result<(), ValidationError> {
        match probe(destination).await {
            Existence::NotExists => {}
            Existence::Exists => {
                return Err(ValidationError::DestinationExists {
                    index,
                    path: destination.to_path_buf(),
                })
            }
            Existence::Unknown(kind) => {
                return Err(ValidationError::Inaccessible {
                    index,
                    path: destination.to_path_buf(),
                    kind,
                })
            }
        }

        let Some(parent) = destination.parent() else {
            return Err(ValidationError::InvalidOperation {
                index,
                reason: format!("destination {:?} has no parent directory", destination),
            });
        };

        match stat(parent, true).await {
            Ok(Some(metadata)) if metadata.is_dir() => {
                if metadata.permissions().readonly() {
                    warn!("Destination directory {:?} looks read-only", parent);
                    push_unique(&mut report.unwritable_parents, parent);
                }
            }
            Ok(Some(_)) => {
                return Err(ValidationError::ParentNotDirectory {
                    index,
                    path: parent.to_path_buf(),
                })
            }
            Ok(None) => push_unique(&mut report.directories_to_create, parent),
            Err(kind) => {
                // Not being able to probe is not fatal; creation is retried at execution.
                debug!("Cannot probe {:?} ({}), deferring to execution", parent, kind);
                push_unique(&mut report.directories_to_create, parent);
            }
        }

        Ok(())
    }
}

/// A destination may not sit above, or below, a path another operation
/// moves from or to. Executing such a batch turns a directory into a file
/// half way through.
fn check_nesting(
    index: usize,
    source: &Path,
    destination: &Path,
    sources: &HashMap<PathBuf, usize>,
    destinations: &HashMap<PathBuf, usize>,
) -> Result<(), ValidationError> {
    let nested = |outer: &Path, inner: &Path| inner != outer && inner.starts_with(outer);

    for (path, &other) in destinations.iter().chain(sources.iter()) {
        if nested(destination, path) || nested(path, destination) || nested(path, source) {
            return Err(ValidationError::ConflictingPaths {
                index,
                other,
                path: path.clone(),
            });
        }
    }
    for (path, &other) in destinations {
        if nested(source, path) {
            return Err(ValidationError::ConflictingPaths {
                index,
                other,
                path: path.clone(),
            });
        }
    }
    Ok(())
}

fn push_unique(list: &mut Vec<PathBuf>, path: &Path) {
    if !list.iter().any(|p| p == path) {
        list.push(path.to_path_buf());
    }
}
