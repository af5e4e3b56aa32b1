//! Guarded execution: validate, back up, execute, record undo, log.
//!
//! Once files have been touched nothing here returns early. Failing to
//! write the log or save the undo stack is reported on the outcome instead.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tidyfile_core::{Operation, OperationKind, OperationResult, TidyConfig};
use tidyfile_ops::{
    Operator, OperatorConfig, ReverseAction, ReverseOutcome, UndoEntry, UndoManager, UndoReport,
    UndoSummary, ValidationReport,
};

use crate::backup::BackupManager;
use crate::error::{Result, SafetyError};
use crate::oplog::{LogRecord, LogStatus, OperationLog};

/// Options for a guarded run.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Snapshot Move/Rename sources before executing.
    pub create_backup: bool,
    /// Operations per scheduling chunk.
    pub batch_size: usize,
    /// Refuse to run when validation finds issues.
    pub enforce_validation: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            batch_size: OperatorConfig::default().batch_size,
            enforce_validation: true,
        }
    }
}

/// What a guarded run did.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub validation: ValidationReport,
    pub backup_id: Option<String>,
    pub result: OperationResult,
    /// Id of the undo batch pushed for this run, if any.
    pub undo_batch: Option<u64>,
    /// Set when the undo stack could not be saved.
    pub undo_save_error: Option<String>,
    /// Set when the operation log could not be written.
    pub log_error: Option<String>,
}

/// What undoing a batch did.
#[derive(Debug, Clone)]
pub struct UndoOutcome {
    pub report: UndoReport,
    /// Set when the popped stack could not be saved. The saved stack still
    /// holds the batch that was just replayed.
    pub undo_save_error: Option<String>,
    /// Set when the reverse actions could not be logged.
    pub log_error: Option<String>,
}

/// Ties the operator, undo stack, backup store and log together.
#[derive(Debug)]
pub struct Session {
    operator: Operator,
    undo: UndoManager,
    backups: Option<BackupManager>,
    log: Option<OperationLog>,
    undo_path: Option<PathBuf>,
}

impl Session {
    /// Session without persistence, backups or logging.
    pub fn new(operator: Operator, undo: UndoManager) -> Self {
        Self {
            operator,
            undo,
            backups: None,
            log: None,
            undo_path: None,
        }
    }

    /// Session with every store placed under the configured data directory.
    /// The undo stack is loaded from disk if it was saved before.
    pub fn from_config(config: &TidyConfig, dry_run: bool) -> Result<Self> {
        let undo_path = config.undo_path();
        let undo = UndoManager::load(&undo_path, config.max_history)
            .map_err(|e| SafetyError::io(&undo_path, e))?;

        let operator = Operator::new(
            OperatorConfig::default()
                .with_dry_run(dry_run)
                .with_batch_size(config.batch_size),
        );

        Ok(Self::new(operator, undo)
            .with_backups(BackupManager::new(config.backup_dir()))
            .with_log(OperationLog::new(config.log_dir()))
            .with_undo_path(undo_path))
    }

    pub fn with_backups(mut self, backups: BackupManager) -> Self {
        self.backups = Some(backups);
        self
    }

    pub fn with_log(mut self, log: OperationLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Persist the undo stack to `path` after every change.
    pub fn with_undo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.undo_path = Some(path.into());
        self
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn backups(&self) -> Option<&BackupManager> {
        self.backups.as_ref()
    }

    pub fn log(&self) -> Option<&OperationLog> {
        self.log.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// Undo history, oldest first.
    pub fn history(&self) -> Vec<UndoSummary> {
        self.undo.history()
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    /// Run `operations` through the full pipeline.
    pub fn execute(
        &mut self,
        operations: &[Operation],
        options: ExecuteOptions,
    ) -> Result<SessionOutcome> {
        self.execute_with_cancel(operations, options, &CancellationToken::new())
    }

    /// Like [`execute`](Self::execute), stopping early when `cancel` fires.
    ///
    /// In dry-run mode no backup is taken, nothing is logged and nothing
    /// is pushed on the undo stack.
    pub fn execute_with_cancel(
        &mut self,
        operations: &[Operation],
        options: ExecuteOptions,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome> {
        let dry_run = self.operator.is_dry_run();

        let validation = self.operator.validate(operations);
        if !validation.is_valid() {
            if options.enforce_validation {
                return Err(SafetyError::ValidationFailed {
                    issues: validation.issues,
                });
            }
            warn!(issues = validation.issues.len(), "running despite validation issues");
        }

        let backup_id = match &self.backups {
            Some(backups) if options.create_backup && !dry_run => {
                let sources: Vec<&Path> = operations
                    .iter()
                    .filter(|op| matches!(op.kind(), OperationKind::Move | OperationKind::Rename))
                    .map(Operation::source)
                    .collect();
                Some(backups.create_backup_point(&sources)?)
            }
            _ => None,
        };

        let result =
            self.operator
                .execute_batch_with_cancel(operations, options.batch_size, cancel);

        if dry_run {
            return Ok(SessionOutcome {
                validation,
                backup_id,
                result,
                undo_batch: None,
                undo_save_error: None,
                log_error: None,
            });
        }

        let (undo_batch, undo_save_error) = if result.success_count > 0 {
            let id = self.undo.record_operations(&result.operations);
            (Some(id), self.persist_undo_reporting())
        } else {
            (None, None)
        };

        let log_error = self.log.as_ref().and_then(|log| {
            log.log_result(&result)
                .err()
                .map(|e| bookkeeping_failure("could not write operation log", e))
        });

        info!(
            backup = backup_id.as_deref().unwrap_or("-"),
            "{}",
            result.summary()
        );

        Ok(SessionOutcome {
            validation,
            backup_id,
            result,
            undo_batch,
            undo_save_error,
            log_error,
        })
    }

    /// Undo the most recent batch, logging each reverse action.
    ///
    /// The popped stack is saved before anything is logged. Returns `None`
    /// when there is nothing to undo.
    pub fn undo_last(&mut self) -> Option<UndoOutcome> {
        let report = self.undo.undo_last_report()?;
        let undo_save_error = self.persist_undo_reporting();

        let log_error = self.log.as_ref().and_then(|log| {
            let records: Vec<LogRecord> = report
                .outcomes
                .iter()
                .map(|(entry, outcome)| reverse_record(entry, outcome))
                .collect();
            log.append_all(&records)
                .err()
                .map(|e| bookkeeping_failure("could not log reverse actions", e))
        });

        Some(UndoOutcome {
            report,
            undo_save_error,
            log_error,
        })
    }

    /// Drop the whole undo history.
    pub fn clear_history(&mut self) -> Result<()> {
        self.undo.clear_history();
        self.persist_undo()
    }

    fn persist_undo(&self) -> Result<()> {
        match &self.undo_path {
            Some(path) => self.undo.save(path).map_err(|e| SafetyError::io(path, e)),
            None => Ok(()),
        }
    }

    fn persist_undo_reporting(&self) -> Option<String> {
        self.persist_undo()
            .err()
            .map(|e| bookkeeping_failure("could not save undo history", e))
    }
}

fn bookkeeping_failure(what: &str, error: SafetyError) -> String {
    warn!(error = %error, "{what}");
    format!("{what}: {error}")
}

fn reverse_record(entry: &UndoEntry, outcome: &ReverseOutcome) -> LogRecord {
    let (source, target) = match &entry.action {
        ReverseAction::Move { from, to } | ReverseAction::Rename { from, to } => {
            (from.clone(), to.clone())
        }
        ReverseAction::RemoveEmptyFolder { path } => (path.clone(), path.clone()),
    };
    let (status, error) = match outcome {
        ReverseOutcome::Reverted(_) => (LogStatus::Reverted, None),
        ReverseOutcome::Skipped(why) => (LogStatus::Skipped, Some(why.clone())),
        ReverseOutcome::Failed(e) => (LogStatus::Failed, Some(e.clone())),
    };

    LogRecord {
        timestamp: chrono::Utc::now(),
        operation_id: entry.operation_id().to_string(),
        kind: entry.operation.kind(),
        source,
        target,
        reason: entry.action.description(),
        status,
        error,
    }
}
