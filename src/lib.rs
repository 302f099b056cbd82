// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Quantum Organizer: AI-assisted folder reorganization
//!
//! Scans a folder, takes suggested destinations from an external advisor and
//! applies them as a validated batch of moves, backing up every source first
//! so the batch can be restored later.

pub mod advisor;
pub mod backup;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod operation;
pub mod reorganizer;
pub mod scanner;
pub mod validator;

pub use config::AppConfig;
pub use error::{OrganizerError, Result};
pub use operation::{Batch, FileOperation};
pub use reorganizer::{ApplyResult, Reorganizer, Stage};
pub use scanner::{FileDescriptor, FolderContents, FolderScanner};
