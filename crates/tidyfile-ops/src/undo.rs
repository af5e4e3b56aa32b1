//! Undo stack of reverse operations.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tidyfile_core::{Operation, OperationKind};

use crate::DEFAULT_MAX_HISTORY;
use crate::operator::Operator;

/// The structural inverse of an applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReverseAction {
    /// Move an item back to where it came from.
    Move { from: PathBuf, to: PathBuf },
    /// Rename an item back to its old path.
    Rename { from: PathBuf, to: PathBuf },
    /// Remove a created folder, but only if it is empty.
    RemoveEmptyFolder { path: PathBuf },
}

impl ReverseAction {
    /// Reverse of an applied operation. Delete has none.
    pub fn for_operation(op: &Operation) -> Option<Self> {
        match op.kind() {
            OperationKind::Move => Some(Self::Move {
                from: op.target().to_path_buf(),
                to: op.source().to_path_buf(),
            }),
            OperationKind::Rename => Some(Self::Rename {
                from: op.target().to_path_buf(),
                to: op.source().to_path_buf(),
            }),
            OperationKind::CreateFolder => Some(Self::RemoveEmptyFolder {
                path: op.folder().to_path_buf(),
            }),
            OperationKind::Delete => None,
        }
    }

    /// Get a description of this reverse action.
    pub fn description(&self) -> String {
        match self {
            Self::Move { from, to } => {
                format!("Move {} back to {}", from.display(), to.display())
            }
            Self::Rename { from, to } => {
                format!("Rename {} back to {}", from.display(), to.display())
            }
            Self::RemoveEmptyFolder { path } => {
                format!("Remove folder {} if empty", path.display())
            }
        }
    }
}

/// One reverse action, tied to the operation it undoes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    /// The applied operation, with its resolved target.
    pub operation: Operation,
    pub action: ReverseAction,
}

impl UndoEntry {
    pub fn operation_id(&self) -> &str {
        self.operation.id()
    }
}

/// Reverse actions of one executed batch, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoBatch {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<UndoEntry>,
}

/// Read-only view of a stacked batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoSummary {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub operation_count: usize,
}

/// What happened to one reverse action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReverseOutcome {
    /// The item was put back. Carries the path written.
    Reverted(PathBuf),
    /// Nothing was done, without error (e.g. the folder is not empty).
    Skipped(String),
    /// The reverse action failed.
    Failed(String),
}

impl ReverseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-action results of undoing one batch.
#[derive(Debug, Clone)]
pub struct UndoReport {
    pub batch_id: u64,
    /// Entries in the order they were replayed (last executed first).
    pub outcomes: Vec<(UndoEntry, ReverseOutcome)>,
}

impl UndoReport {
    /// Check if every reverse action went through.
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|(_, o)| o.is_failure())
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredHistory {
    next_id: u64,
    batches: Vec<UndoBatch>,
}

/// Bounded LIFO stack of undo batches.
///
/// Pushing beyond `max_history` evicts the oldest batch.
#[derive(Debug)]
pub struct UndoManager {
    batches: VecDeque<UndoBatch>,
    max_history: usize,
    next_id: u64,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl UndoManager {
    /// Create an empty stack holding at most `max_history` batches.
    pub fn new(max_history: usize) -> Self {
        Self {
            batches: VecDeque::with_capacity(max_history.min(1000)),
            max_history,
            next_id: 0,
        }
    }

    /// Push the reverses of `operations` as a single batch.
    ///
    /// `operations` must be the applied operations (with resolved targets)
    /// in execution order. Delete operations have no reverse and are left
    /// out with a warning. Returns the id of the new batch.
    pub fn record_operations(&mut self, operations: &[Operation]) -> u64 {
        let entries = operations
            .iter()
            .filter_map(|op| match ReverseAction::for_operation(op) {
                Some(action) => Some(UndoEntry {
                    operation: op.clone(),
                    action,
                }),
                None => {
                    warn!(op = %op, "no reverse for operation, it cannot be undone");
                    None
                }
            })
            .collect();

        let id = self.next_id;
        self.next_id += 1;
        self.push(UndoBatch {
            id,
            timestamp: Utc::now(),
            entries,
        });
        id
    }

    fn push(&mut self, batch: UndoBatch) {
        if self.max_history == 0 {
            return;
        }
        while self.batches.len() >= self.max_history {
            if let Some(evicted) = self.batches.pop_front() {
                info!(batch = evicted.id, "undo history full, dropping oldest batch");
            }
        }
        self.batches.push_back(batch);
    }

    /// Undo the most recent batch. Returns true only if every reverse
    /// action succeeded. The batch is popped either way.
    pub fn undo_last(&mut self) -> bool {
        self.undo_last_report().is_some_and(|r| r.is_success())
    }

    /// Undo the most recent batch and report each reverse action.
    ///
    /// Reverse actions run last-executed-first. Failures are logged and
    /// replay continues; nothing is re-pushed or compensated.
    pub fn undo_last_report(&mut self) -> Option<UndoReport> {
        let batch = self.batches.pop_back()?;
        let operator = Operator::default();

        info!(batch = batch.id, actions = batch.entries.len(), "undoing batch");

        let outcomes: Vec<_> = batch
            .entries
            .into_iter()
            .rev()
            .map(|entry| {
                let outcome = replay(&operator, &entry.action);
                match &outcome {
                    ReverseOutcome::Failed(e) => {
                        warn!(action = %entry.action.description(), error = %e, "reverse failed")
                    }
                    ReverseOutcome::Skipped(why) => {
                        info!(action = %entry.action.description(), reason = %why, "reverse skipped")
                    }
                    ReverseOutcome::Reverted(_) => {}
                }
                (entry, outcome)
            })
            .collect();

        Some(UndoReport {
            batch_id: batch.id,
            outcomes,
        })
    }

    /// Check if there is anything to undo.
    pub fn can_undo(&self) -> bool {
        !self.batches.is_empty()
    }

    /// Summaries of stacked batches, oldest first.
    pub fn history(&self) -> Vec<UndoSummary> {
        self.batches
            .iter()
            .map(|b| UndoSummary {
                id: b.id,
                timestamp: b.timestamp,
                operation_count: b.entries.len(),
            })
            .collect()
    }

    /// Stacked batches, oldest first.
    pub fn batches(&self) -> impl DoubleEndedIterator<Item = &UndoBatch> {
        self.batches.iter()
    }

    /// Most recent batch without removing it.
    pub fn peek(&self) -> Option<&UndoBatch> {
        self.batches.back()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Drop every stacked batch.
    pub fn clear_history(&mut self) {
        self.batches.clear();
    }

    /// Write the stack to `path` as JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredHistory {
            next_id: self.next_id,
            batches: self.batches.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(path, json)
    }

    /// Load a stack saved with [`save`](Self::save).
    ///
    /// A missing file yields an empty stack. If the file holds more than
    /// `max_history` batches, the oldest are dropped.
    pub fn load(path: &Path, max_history: usize) -> io::Result<Self> {
        let mut manager = Self::new(max_history);
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(manager),
            Err(e) => return Err(e),
        };

        let stored: StoredHistory = serde_json::from_str(&json)?;
        manager.next_id = stored.next_id;
        for batch in stored.batches {
            manager.push(batch);
        }
        Ok(manager)
    }
}

fn replay(operator: &Operator, action: &ReverseAction) -> ReverseOutcome {
    match action {
        ReverseAction::Move { from, to } | ReverseAction::Rename { from, to } => {
            match operator.move_file(from, to) {
                Ok(written) => ReverseOutcome::Reverted(written),
                Err(e) => ReverseOutcome::Failed(e.to_string()),
            }
        }
        ReverseAction::RemoveEmptyFolder { path } => match operator.remove_empty_folder(path) {
            Ok(true) => ReverseOutcome::Reverted(path.clone()),
            Ok(false) => ReverseOutcome::Skipped("folder is missing or not empty".to_string()),
            Err(e) => ReverseOutcome::Failed(e.to_string()),
        },
    }
}
