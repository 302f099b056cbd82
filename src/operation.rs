// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Proposed file moves

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One proposed move. Identity is the path pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOperation {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

impl FileOperation {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source.into(),
            destination_path: destination.into(),
        }
    }

    /// Both paths are non-empty
    pub fn is_well_formed(&self) -> bool {
        !self.source_path.as_os_str().is_empty() && !self.destination_path.as_os_str().is_empty()
    }

    /// Resolve relative paths against `root`; absolute paths are kept.
    /// Empty paths stay empty so validation still rejects them.
    pub fn resolved_against(&self, root: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.as_os_str().is_empty() {
                PathBuf::new()
            } else {
                root.join(p)
            }
        };
        Self {
            source_path: resolve(&self.source_path),
            destination_path: resolve(&self.destination_path),
        }
    }

    /// The operation that undoes this one
    pub fn reversed(&self) -> Self {
        Self {
            source_path: self.destination_path.clone(),
            destination_path: self.source_path.clone(),
        }
    }
}

/// An ordered set of moves processed together
pub type Batch = Vec<FileOperation>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_against_root() {
        let op = FileOperation::new("a.txt", "docs/a.txt").resolved_against(Path::new("/f"));
        assert_eq!(op.source_path, PathBuf::from("/f/a.txt"));
        assert_eq!(op.destination_path, PathBuf::from("/f/docs/a.txt"));

        let abs = FileOperation::new("/elsewhere/b", "c").resolved_against(Path::new("/f"));
        assert_eq!(abs.source_path, PathBuf::from("/elsewhere/b"));
    }

    #[test]
    fn test_empty_paths_stay_empty() {
        let op = FileOperation::new("", "x").resolved_against(Path::new("/f"));
        assert!(!op.is_well_formed());
    }

    #[test]
    fn test_boundary_field_names() {
        let op: FileOperation =
            serde_json::from_str(r#"{"sourcePath": "/f/a", "destinationPath": "/f/b/a"}"#).unwrap();
        assert_eq!(op.reversed(), FileOperation::new("/f/b/a", "/f/a"));
    }
}
