// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management
//!
//! The configuration is owned by the boundary (CLI or embedding UI) and passed
//! explicitly into the [`Reorganizer`](crate::reorganizer::Reorganizer).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{OrganizerError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Backup snapshot layout
    #[serde(default)]
    pub backup: BackupConfig,

    /// Advisor streaming settings
    #[serde(default)]
    pub suggestions: SuggestionConfig,

    /// Folder scanning settings
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackupConfig {
    /// Directory created inside the scanned folder to hold snapshots
    #[serde(default = "default_backup_dir")]
    pub dir_name: String,
    /// Journal file name inside the backup directory
    #[serde(default = "default_journal_file")]
    pub journal_file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SuggestionConfig {
    /// Pause between streamed suggestions
    #[serde(default = "default_delay_ms")]
    pub inter_item_delay_ms: u64,
    /// Bound of the suggestion channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    /// Report dot-files when scanning
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

// Default value functions
fn default_backup_dir() -> String { ".quantum_backup".to_string() }
fn default_journal_file() -> String { "history.jsonl".to_string() }
fn default_delay_ms() -> u64 { 100 }
fn default_channel_capacity() -> usize { 16 }
fn default_true() -> bool { true }

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir_name: default_backup_dir(),
            journal_file: default_journal_file(),
        }
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            inter_item_delay_ms: default_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_hidden: default_true(),
        }
    }
}

impl SuggestionConfig {
    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| OrganizerError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let single_component = |name: &str| {
            !name.is_empty()
                && name != "."
                && name != ".."
                && !name.contains(['/', '\\'])
        };

        if !single_component(&self.backup.dir_name) {
            return Err(OrganizerError::Config(format!(
                "backup.dir_name must be a single directory name, got {:?}",
                self.backup.dir_name
            )));
        }
        if !single_component(&self.backup.journal_file) {
            return Err(OrganizerError::Config(format!(
                "backup.journal_file must be a single file name, got {:?}",
                self.backup.journal_file
            )));
        }
        if self.suggestions.channel_capacity == 0 {
            return Err(OrganizerError::Config(
                "suggestions.channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.backup.dir_name, ".quantum_backup");
        assert_eq!(config.suggestions.inter_item_delay(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"backup": {"dir_name": ".snapshots"}}"#).unwrap();
        assert_eq!(config.backup.dir_name, ".snapshots");
        assert_eq!(config.backup.journal_file, "history.jsonl");
        assert_eq!(config.suggestions.channel_capacity, 16);
        assert!(config.scan.include_hidden);
    }

    #[test]
    fn test_rejects_nested_backup_dir() {
        let mut config = AppConfig::default();
        config.backup.dir_name = "a/b".to_string();
        assert!(config.validate().is_err());

        config.backup.dir_name = "..".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.suggestions.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.backup.dir_name, ".quantum_backup");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.suggestions.inter_item_delay_ms = 0;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.suggestions.inter_item_delay_ms, 0);
    }
}
