// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Quantum Organizer CLI
//!
//! Scan folders, apply suggested reorganizations with automatic backups, and
//! restore from those backups.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use quantum_organizer::advisor::PlanAdvisor;
use quantum_organizer::config::AppConfig;
use quantum_organizer::history::Outcome;
use quantum_organizer::{ApplyResult, FileOperation, Reorganizer};

/// Quantum Organizer CLI - AI-assisted folder reorganization
#[derive(Parser, Debug)]
#[command(name = "quantum-organizer")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Reorganize folders from AI suggestions with backup and restore", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the files directly inside a folder
    Scan {
        /// Folder to scan
        folder: PathBuf,
    },

    /// Apply a suggestion plan to a folder
    Apply {
        /// Folder to reorganize
        folder: PathBuf,

        /// JSON array of suggestions ({originalPath, newPath, reason, tags})
        #[arg(short, long)]
        plan: PathBuf,

        /// Show the moves without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore files from a backup snapshot
    Restore {
        /// Backup directory (<folder>/.quantum_backup/<id>)
        #[arg(required_unless_present = "latest")]
        backup: Option<PathBuf>,

        /// Restore the newest backup of this folder instead
        #[arg(long, conflicts_with = "backup")]
        latest: Option<PathBuf>,
    },

    /// List backup snapshots of a folder
    Backups {
        /// Folder whose backups to list
        folder: PathBuf,
    },

    /// Show recent reorganization requests for a folder
    History {
        /// Folder whose history to show
        folder: PathBuf,

        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {:?}", cli.config))?;

    match cli.command {
        Commands::Scan { folder } => run_scan(config, &absolute(&folder)?, &cli.format).await,
        Commands::Apply { folder, plan, dry_run } => {
            run_apply(config, &absolute(&folder)?, &plan, dry_run, &cli.format).await
        }
        Commands::Restore { backup, latest } => {
            let backup = backup.as_deref().map(absolute).transpose()?;
            let latest = latest.as_deref().map(absolute).transpose()?;
            run_restore(config, backup, latest, &cli.format).await
        }
        Commands::Backups { folder } => run_backups(config, &absolute(&folder)?, &cli.format).await,
        Commands::History { folder, count } => {
            run_history(config, &absolute(&folder)?, count, &cli.format).await
        }
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

/// Folder arguments are made absolute so backup paths are unambiguous
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolving {:?}", path))
}

/// Print a value as JSON when a JSON format was requested. Returns false for text.
fn emit<T: Serialize>(value: &T, format: &str) -> anyhow::Result<bool> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(value)?),
        "jsonl" => println!("{}", serde_json::to_string(value)?),
        _ => return Ok(false),
    }
    Ok(true)
}

/// Scan a folder and print its files
async fn run_scan(config: AppConfig, folder: &Path, format: &str) -> anyhow::Result<()> {
    let organizer = Reorganizer::new(config);
    let contents = organizer.scan(folder).await?;

    if format == "jsonl" {
        for file in &contents.files {
            println!("{}", serde_json::to_string(file)?);
        }
        return Ok(());
    }
    if emit(&contents, format)? {
        return Ok(());
    }

    for file in &contents.files {
        println!(
            "{:>10}  {}  {:<6} {}",
            file.size,
            file.last_modified.format("%Y-%m-%d %H:%M"),
            file.file_type,
            file.name
        );
    }
    println!("\n{} files, {} bytes", contents.files.len(), contents.total_size());
    Ok(())
}

/// Stream a plan through the advisor seam and apply the resulting batch
async fn run_apply(
    config: AppConfig,
    folder: &Path,
    plan: &Path,
    dry_run: bool,
    format: &str,
) -> anyhow::Result<()> {
    let advisor = PlanAdvisor::load(plan).with_context(|| format!("loading plan {:?}", plan))?;
    info!("Loaded {} suggestions from {:?}", advisor.len(), plan);

    let organizer = Reorganizer::new(config);
    let contents = organizer.scan(folder).await?;
    let mut stream = organizer.suggest(Arc::new(advisor), contents.files);

    let mut batch: Vec<FileOperation> = Vec::new();
    while let Some(change) = stream.next().await {
        match change.to_operation() {
            Ok(op) => {
                if format == "text" {
                    println!(
                        "{} -> {}  ({})",
                        op.source_path.display(),
                        op.destination_path.display(),
                        change.reason
                    );
                }
                batch.push(op);
            }
            Err(e) => warn!("Ignoring suggestion: {}", e),
        }
    }

    if batch.is_empty() {
        println!("No applicable suggestions for {}", folder.display());
        return Ok(());
    }

    if dry_run {
        if !emit(&batch, format)? {
            println!("\nDRY RUN: {} moves not applied", batch.len());
        }
        return Ok(());
    }

    let result = organizer.apply_request(folder, &batch).await;
    if !emit(&result, format)? {
        if result.success {
            println!("\nMoved {} files", result.applied);
        }
        if let Some(ref backup) = result.backup_path {
            println!("Backup: {}", backup.display());
        }
    }

    if !result.success {
        bail!("{}", failure_message(&result));
    }
    Ok(())
}

/// Tell the user whether a failed request left anything behind to restore
fn failure_message(result: &ApplyResult) -> String {
    let reason = result.error.as_deref().unwrap_or("unknown error");
    if result.nothing_touched() {
        return format!("{} (no files were changed)", reason);
    }
    match &result.backup_path {
        Some(backup) => format!(
            "{} (restore with: quantum-organizer restore {})",
            reason,
            backup.display()
        ),
        None => format!("{} (no files were moved)", reason),
    }
}

/// Restore a specific or the newest backup
async fn run_restore(
    config: AppConfig,
    backup: Option<PathBuf>,
    latest: Option<PathBuf>,
    format: &str,
) -> anyhow::Result<()> {
    let organizer = Reorganizer::new(config);

    let report = match (backup, latest) {
        (Some(backup), _) => organizer.restore_from_backup(&backup).await?,
        (None, Some(folder)) => organizer.restore_latest(&folder).await?,
        (None, None) => bail!("either a backup path or --latest <folder> is required"),
    };

    if !emit(&report, format)? {
        for op in &report.restored {
            println!("Restored: {}", op.destination_path.display());
        }
        println!(
            "\nRestored {} files from {}",
            report.restored.len(),
            report.backup_path.display()
        );
    }
    Ok(())
}

/// List backups for a folder
async fn run_backups(config: AppConfig, folder: &Path, format: &str) -> anyhow::Result<()> {
    let organizer = Reorganizer::new(config);
    let ids = organizer.backups().list_backups(folder).await?;
    let paths: Vec<PathBuf> = ids
        .iter()
        .map(|id| organizer.backups().backup_path(folder, id))
        .collect();

    if emit(&paths, format)? {
        return Ok(());
    }
    if paths.is_empty() {
        println!("No backups in {}", folder.display());
    }
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

/// Show recent history entries
async fn run_history(config: AppConfig, folder: &Path, count: usize, format: &str) -> anyhow::Result<()> {
    let organizer = Reorganizer::new(config);
    let entries = organizer.history(folder).get_recent(count).await?;

    if emit(&entries, format)? {
        return Ok(());
    }

    println!("Recent history ({} entries):", entries.len());
    for entry in entries {
        let status = match &entry.outcome {
            Outcome::Succeeded { applied } => format!("ok, {} files", applied),
            Outcome::Failed { stage, applied, .. } => {
                format!("FAILED at {:?}, {} files moved", stage, applied)
            }
        };
        println!(
            "  {} {:?} [{}]",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.kind,
            status
        );
        if let Some(backup) = &entry.backup_path {
            println!("      backup: {}", backup.display());
        }
    }
    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Backup directory: {}", config.backup.dir_name);
            println!("  Suggestion delay: {} ms", config.suggestions.inter_item_delay_ms);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["quantum-organizer"]).is_err());
    }

    #[test]
    fn test_cli_apply_command() {
        let cli = Cli::try_parse_from([
            "quantum-organizer", "apply", "/tmp/f", "--plan", "plan.json", "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Apply { folder, plan, dry_run } => {
                assert!(dry_run);
                assert_eq!(folder, PathBuf::from("/tmp/f"));
                assert_eq!(plan, PathBuf::from("plan.json"));
            }
            _ => panic!("Expected Apply command"),
        }
    }

    #[test]
    fn test_cli_restore_forms() {
        let cli = Cli::try_parse_from(["quantum-organizer", "restore", "--latest", "/tmp/f"]).unwrap();
        match cli.command {
            Commands::Restore { backup, latest } => {
                assert!(backup.is_none());
                assert_eq!(latest, Some(PathBuf::from("/tmp/f")));
            }
            _ => panic!("Expected Restore command"),
        }

        assert!(Cli::try_parse_from(["quantum-organizer", "restore"]).is_err());
        assert!(Cli::try_parse_from([
            "quantum-organizer", "restore", "/tmp/f/.quantum_backup/x", "--latest", "/tmp/f"
        ])
        .is_err());
    }

    #[test]
    fn test_failure_message_points_at_backup() {
        let untouched: ApplyResult = serde_json::from_str(
            r#"{"success": false, "error": "Validation failed: x", "stage": "validating", "applied": 0}"#,
        )
        .unwrap();
        assert_eq!(
            failure_message(&untouched),
            "Validation failed: x (no files were changed)"
        );

        let partial: ApplyResult = serde_json::from_str(
            r#"{"success": false, "backupPath": "/f/.quantum_backup/id", "error": "Execution failed",
                "stage": "executing", "applied": 1}"#,
        )
        .unwrap();
        assert_eq!(
            failure_message(&partial),
            "Execution failed (restore with: quantum-organizer restore /f/.quantum_backup/id)"
        );
    }

    #[test]
    fn test_cli_global_format() {
        let cli = Cli::try_parse_from(["quantum-organizer", "scan", "/tmp/f", "--format", "json"]).unwrap();
        assert_eq!(cli.format, "json");
        assert!(Cli::try_parse_from(["quantum-organizer", "scan", "/tmp/f", "--format", "xml"]).is_err());
    }
}
