//! tidy - safe, undoable file organization.
//!
//! Usage:
//!   tidy scan [PATH]            List files with metadata
//!   tidy preview <PLAN>         Show what a plan would do
//!   tidy validate <PLAN>        Pre-flight check a plan
//!   tidy apply <PLAN>           Back up, execute, log and record undo
//!   tidy undo                   Revert the last applied plan
//!   tidy history                Show undo stack and recent log entries
//!   tidy backups list           Manage backup points
//!   tidy logs cleanup           Remove old operation logs

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use tidyfile_core::{Operation, TidyConfig, parse_plan};
use tidyfile_ops::{Operator, ReverseOutcome};
use tidyfile_safety::{BackupManager, DriftStatus, ExecuteOptions, OperationLog, Session};
use tidyfile_scan::{ScanConfig, Scanner, group_by_extension};

#[derive(Parser)]
#[command(
    name = "tidy",
    version,
    about = "Safe, undoable file organization",
    long_about = "tidy applies file organization plans (move, rename, create folder) \
                  with conflict-safe renaming, backup points, an operation log and undo."
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for backups, logs and undo history
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and list its files
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Only include these extensions (repeatable)
        #[arg(short, long = "ext")]
        extensions: Vec<String>,

        /// Maximum depth below the root
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// Sample text content
        #[arg(long)]
        content: bool,

        /// Skip format-specific metadata
        #[arg(long)]
        no_metadata: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show what a plan would do without touching anything
    Preview {
        /// JSON plan file
        plan: PathBuf,
    },

    /// Check a plan for problems before running it
    Validate {
        /// JSON plan file
        plan: PathBuf,
    },

    /// Execute a plan
    Apply {
        /// JSON plan file
        plan: PathBuf,

        /// Report what would happen without changing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Skip the backup point
        #[arg(long)]
        no_backup: bool,

        /// Run even if validation finds issues
        #[arg(short, long)]
        force: bool,

        /// Operations per chunk
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Revert the most recently applied plan
    Undo,

    /// Show undo history and recent operations
    History {
        /// Number of log entries to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Manage backup points
    Backups {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Manage operation logs
    Logs {
        #[command(subcommand)]
        action: LogAction,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// List backup points, newest first
    List,
    /// Compare a backup point against the current files
    Verify { id: String },
    /// Delete a backup point
    Delete { id: String },
}

#[derive(Subcommand)]
enum LogAction {
    /// Remove daily logs older than the retention period
    Cleanup {
        /// Days to keep (defaults to the configured retention)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Scan {
            path,
            recursive,
            extensions,
            max_depth,
            content,
            no_metadata,
            format,
        } => {
            let scan_config = ScanConfig::builder()
                .root(path)
                .recursive(recursive)
                .extensions(extensions.into_iter().collect::<std::collections::BTreeSet<_>>())
                .max_depth(max_depth.unwrap_or(config.max_depth))
                .include_metadata(!no_metadata)
                .include_content(content)
                .max_content_bytes(config.max_content_mb.saturating_mul(1024 * 1024))
                .build()
                .context("Invalid scan options")?;
            run_scan(&scan_config, format)?;
        }
        Command::Preview { plan } => run_preview(&read_plan(&plan)?),
        Command::Validate { plan } => run_validate(&read_plan(&plan)?)?,
        Command::Apply {
            plan,
            dry_run,
            no_backup,
            force,
            batch_size,
        } => {
            let options = ExecuteOptions {
                create_backup: config.create_backup && !no_backup,
                batch_size: batch_size.unwrap_or(config.batch_size),
                enforce_validation: !force,
            };
            run_apply(&config, &read_plan(&plan)?, dry_run, options)?;
        }
        Command::Undo => run_undo(&config)?,
        Command::History { limit } => run_history(&config, limit)?,
        Command::Backups { action } => run_backups(&config, action)?,
        Command::Logs {
            action: LogAction::Cleanup { days },
        } => {
            let days = days.unwrap_or(config.log_retention_days);
            let removed = OperationLog::new(config.log_dir())
                .cleanup_old_logs(days)
                .context("Log cleanup failed")?;
            println!("Removed {removed} log file(s) older than {days} days");
        }
    }

    Ok(())
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<TidyConfig> {
    let path = path.map_or_else(TidyConfig::default_path, Path::to_path_buf);
    Ok(TidyConfig::load(&path)?)
}

fn read_plan(path: &Path) -> Result<Vec<Operation>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    parse_plan(&json).with_context(|| format!("Invalid plan {}", path.display()))
}

/// Scan and print records.
fn run_scan(config: &ScanConfig, format: OutputFormat) -> Result<()> {
    eprintln!("Scanning {}...", config.root.display());

    let records = Scanner::new().scan(config).context("Scan failed")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Text => {
            let total: u64 = records.iter().map(|r| r.size).sum();
            println!();
            println!("{}", "─".repeat(60));
            println!(" {} - {}", config.root.display(), format_size(total));
            println!(" {} files", records.len());
            println!("{}", "─".repeat(60));

            for (extension, group) in group_by_extension(&records) {
                let size: u64 = group.iter().map(|r| r.size).sum();
                println!();
                println!(" {extension} ({} files, {})", group.len(), format_size(size));
                for record in group {
                    println!("   {:<50} {:>10}", truncate(&record.name, 50), record.size_human());
                }
            }
        }
    }

    Ok(())
}

fn run_preview(operations: &[Operation]) {
    let report = Operator::dry_run().preview(operations);

    println!("{} operation(s)", report.total());
    for (kind, count) in &report.counts_by_type {
        println!("   {kind:<14} {count}");
    }
    print_list("Warnings", &report.warnings);
    print_list("Errors", &report.errors);
}

fn run_validate(operations: &[Operation]) -> Result<()> {
    let report = Operator::dry_run().validate(operations);

    print_list("Issues", &report.issues);
    print_list("Warnings", &report.warnings);
    if !report.is_valid() {
        bail!("Plan has {} issue(s)", report.issues.len());
    }
    println!("Plan is valid");
    Ok(())
}

fn run_apply(
    config: &TidyConfig,
    operations: &[Operation],
    dry_run: bool,
    options: ExecuteOptions,
) -> Result<()> {
    let mut session = Session::from_config(config, dry_run).context("Failed to open session")?;
    let outcome = session.execute(operations, options)?;

    print_list("Warnings", &outcome.validation.warnings);

    let prefix = if dry_run { "[dry run] " } else { "" };
    for op in &outcome.result.operations {
        println!("{prefix}{op}");
    }
    for failure in &outcome.result.failures {
        println!("FAILED {}: {}", failure.operation, failure.error);
    }

    println!();
    println!("{prefix}{}", outcome.result.summary());
    if let Some(id) = &outcome.backup_id {
        println!("Backup point: {id}");
    }
    warn_bookkeeping(outcome.undo_save_error.as_deref(), outcome.log_error.as_deref());
    if outcome.undo_batch.is_some() {
        println!("Run `tidy undo` to revert");
    }

    if outcome.result.failed_count > 0 {
        bail!("{} operation(s) failed", outcome.result.failed_count);
    }
    Ok(())
}

fn run_undo(config: &TidyConfig) -> Result<()> {
    let mut session = Session::from_config(config, false).context("Failed to open session")?;

    let Some(undone) = session.undo_last() else {
        println!("Nothing to undo");
        return Ok(());
    };
    let report = &undone.report;

    for (entry, outcome) in &report.outcomes {
        let label = match outcome {
            ReverseOutcome::Reverted(_) => "reverted".to_string(),
            ReverseOutcome::Skipped(why) => format!("skipped ({why})"),
            ReverseOutcome::Failed(e) => format!("FAILED ({e})"),
        };
        println!("{label}: {}", entry.action.description());
    }
    warn_bookkeeping(undone.undo_save_error.as_deref(), undone.log_error.as_deref());
    if !report.is_success() {
        bail!(
            "{} reverse action(s) failed; the filesystem may be partially restored",
            report.failed_count()
        );
    }
    println!("Undo complete");
    Ok(())
}

fn warn_bookkeeping(undo_save_error: Option<&str>, log_error: Option<&str>) {
    if let Some(e) = undo_save_error {
        eprintln!("warning: {e}; `tidy undo` may not see this change");
    }
    if let Some(e) = log_error {
        eprintln!("warning: {e}");
    }
}

fn run_history(config: &TidyConfig, limit: usize) -> Result<()> {
    let session = Session::from_config(config, true).context("Failed to open session")?;

    let undo = session.undo_manager();
    println!("Undo history ({} batch(es), newest first):", undo.len());
    for batch in undo.batches().rev() {
        println!(
            "   #{:<4} {}  {} operation(s)",
            batch.id,
            batch.timestamp.format("%Y-%m-%d %H:%M:%S"),
            batch.entries.len()
        );
        for entry in &batch.entries {
            let reason = entry.operation.reason();
            if reason.is_empty() {
                println!("         {}", entry.operation);
            } else {
                println!("         {}  ({reason})", entry.operation);
            }
        }
    }

    println!();
    println!("Recent operations:");
    let records = OperationLog::new(config.log_dir())
        .recent(limit)
        .context("Failed to read operation log")?;
    for record in records {
        println!(
            "   {}  {:<8} {:<14} {} -> {}{}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.status.as_str(),
            record.kind,
            record.source.display(),
            record.target.display(),
            record.error.map(|e| format!(" ({e})")).unwrap_or_default()
        );
    }
    Ok(())
}

fn run_backups(config: &TidyConfig, action: BackupAction) -> Result<()> {
    let backups = BackupManager::new(config.backup_dir());

    match action {
        BackupAction::List => {
            for backup in backups.list_backups()? {
                println!(
                    "{:<20} {}  {} file(s)",
                    backup.backup_id,
                    backup.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    backup.file_count
                );
            }
        }
        BackupAction::Verify { id } => {
            let audit = backups.restore_backup(&id)?;
            for (path, status) in &audit.files {
                let label = match status {
                    DriftStatus::Unchanged => "unchanged",
                    DriftStatus::Missing => "moved/missing",
                    DriftStatus::Modified => "modified",
                    DriftStatus::Appeared => "appeared",
                    DriftStatus::Absent => "absent",
                };
                println!("   {label:<14} {}", path.display());
            }
            if audit.is_clean() {
                println!("No drift since backup {id}");
            } else {
                println!("Files drifted since backup {id}; content is not restored");
            }
        }
        BackupAction::Delete { id } => {
            if backups.delete_backup(&id)? {
                println!("Deleted backup {id}");
            } else {
                println!("No backup {id}");
            }
        }
    }
    Ok(())
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{title}:");
    for item in items {
        println!("   {item}");
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max chars.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
