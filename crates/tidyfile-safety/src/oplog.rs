//! Append-only operation log in JSON Lines, one file per local day.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tidyfile_core::{ExecutionStatus, Operation, OperationKind, OperationResult};

use crate::error::{Result, SafetyError};

/// Maximum number of daily files `recent` looks at.
const RECENT_FILES: usize = 7;

/// Lifecycle status of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Pending,
    Success,
    Failed,
    Skipped,
    Reverted,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Reverted => "reverted",
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub operation_id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub source: PathBuf,
    pub target: PathBuf,
    #[serde(default)]
    pub reason: String,
    pub status: LogStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl LogRecord {
    /// Record for `operation` with the given status.
    pub fn new(operation: &Operation, status: LogStatus, error: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation_id: operation.id().to_string(),
            kind: operation.kind(),
            source: operation.source().to_path_buf(),
            target: operation.target().to_path_buf(),
            reason: operation.reason().to_string(),
            status,
            error,
        }
    }
}

/// Daily JSON Lines files under a log directory.
#[derive(Debug, Clone)]
pub struct OperationLog {
    dir: PathBuf,
}

impl OperationLog {
    /// Create a log rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Append a single record to today's file.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        self.append_all(std::slice::from_ref(record))
    }

    /// Append records to today's file in one write.
    pub fn append_all(&self, records: &[LogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|e| SafetyError::io(&self.dir, e))?;

        let path = self.file_for(Local::now().date_naive());
        let mut buf = String::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| SafetyError::json(&path, e))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SafetyError::io(&path, e))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| SafetyError::io(&path, e))?;

        debug!(path = %path.display(), records = records.len(), "appended to operation log");
        Ok(())
    }

    /// Log one operation.
    pub fn log_operation(
        &self,
        operation: &Operation,
        status: LogStatus,
        error: Option<String>,
    ) -> Result<()> {
        self.append(&LogRecord::new(operation, status, error))
    }

    /// Log every outcome of a batch in execution order. Returns the number
    /// of records written.
    pub fn log_result(&self, result: &OperationResult) -> Result<usize> {
        let records: Vec<LogRecord> = result
            .outcomes
            .iter()
            .map(|outcome| {
                let status = match outcome.status {
                    ExecutionStatus::Applied => LogStatus::Success,
                    ExecutionStatus::Skipped => LogStatus::Skipped,
                    ExecutionStatus::Failed => LogStatus::Failed,
                };
                LogRecord::new(&outcome.operation, status, outcome.error.clone())
            })
            .collect();

        self.append_all(&records)?;
        Ok(records.len())
    }

    /// Up to `limit` records, newest first, from the most recent daily files.
    pub fn recent(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let mut dates = self.log_dates()?;
        dates.sort_unstable_by(|a, b| b.cmp(a));

        let mut records = Vec::new();
        for date in dates.into_iter().take(RECENT_FILES) {
            let mut day = read_records(&self.file_for(date))?;
            day.reverse();
            records.extend(day);
            if records.len() >= limit {
                break;
            }
        }

        records.truncate(limit);
        Ok(records)
    }

    /// All records of one day, oldest first.
    pub fn by_date(&self, date: NaiveDate) -> Result<Vec<LogRecord>> {
        read_records(&self.file_for(date))
    }

    /// Delete daily files older than `retention_days`. Returns the number
    /// of files removed.
    pub fn cleanup_old_logs(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Local::now().date_naive() - TimeDelta::days(i64::from(retention_days));

        let mut removed = 0;
        for date in self.log_dates()? {
            if date >= cutoff {
                continue;
            }
            let path = self.file_for(date);
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "removed old operation log");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove old log"),
            }
        }
        Ok(removed)
    }

    /// Dates that have a log file. Files not named `YYYY-MM-DD.jsonl` are
    /// ignored.
    fn log_dates(&self) -> Result<Vec<NaiveDate>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SafetyError::io(&self.dir, e)),
        };

        Ok(entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension()? != "jsonl" {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
            })
            .collect())
    }
}

fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SafetyError::io(path, e)),
    };

    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), line = n + 1, error = %e, "skipping corrupt log line");
                None
            }
        })
        .collect())
}
