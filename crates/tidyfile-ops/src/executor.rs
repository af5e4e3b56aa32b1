//! Preview, validation and batch execution.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidyfile_core::{OpError, Operation, OperationKind, OperationResult};

use crate::operator::{Operator, Outcome, rename_target};
use crate::report::{PreviewReport, ValidationReport};
use crate::space::{available_space, path_size};

impl Operator {
    /// Describe what `operations` would do.
    ///
    /// Missing sources are errors; occupied targets and missing target
    /// parents are warnings.
    pub fn preview(&self, operations: &[Operation]) -> PreviewReport {
        let mut report = PreviewReport::default();

        for op in operations {
            *report.counts_by_type.entry(op.kind()).or_insert(0) += 1;

            match op.kind() {
                OperationKind::Move | OperationKind::Rename => {
                    if !exists(op.source()) {
                        report
                            .errors
                            .push(format!("source does not exist: {}", op.source().display()));
                    }
                    match planned_target(op) {
                        Ok(target) => {
                            if exists(&target) {
                                report.warnings.push(format!(
                                    "target exists, incoming item will be renamed: {}",
                                    target.display()
                                ));
                            }
                            if let Some(parent) = target
                                .parent()
                                .filter(|p| !p.as_os_str().is_empty() && !p.exists())
                            {
                                report.warnings.push(format!(
                                    "target folder will be created: {}",
                                    parent.display()
                                ));
                            }
                        }
                        Err(e) => report.errors.push(e.to_string()),
                    }
                }
                OperationKind::CreateFolder => {
                    if op.folder().is_dir() {
                        report.warnings.push(format!(
                            "folder already exists: {}",
                            op.folder().display()
                        ));
                    }
                }
                OperationKind::Delete => {
                    report.errors.push(format!(
                        "delete is not supported: {}",
                        op.source().display()
                    ));
                }
            }
        }

        report.has_errors = !report.errors.is_empty();
        report
    }

    /// Check `operations` before running them.
    ///
    /// Issues: missing source, unresolvable target, not enough free space on
    /// the target volume, and any Delete. Occupied targets are warnings.
    pub fn validate(&self, operations: &[Operation]) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (index, op) in operations.iter().enumerate() {
            let prefix = format!("#{index} {}", op.kind());

            match op.kind() {
                OperationKind::Move | OperationKind::Rename => {
                    if !exists(op.source()) {
                        report.issues.push(format!(
                            "{prefix}: source does not exist: {}",
                            op.source().display()
                        ));
                        continue;
                    }

                    let target = match planned_target(op) {
                        Ok(target) => target,
                        Err(e) => {
                            report.issues.push(format!("{prefix}: {e}"));
                            continue;
                        }
                    };

                    if exists(&target) {
                        report.warnings.push(format!(
                            "{prefix}: target exists, incoming item will be renamed: {}",
                            target.display()
                        ));
                    }

                    let needed = path_size(op.source());
                    match available_space(&target) {
                        Ok(free) if free < needed => report.issues.push(format!(
                            "{prefix}: not enough space at {} ({needed} bytes needed, {free} free)",
                            target.display()
                        )),
                        Ok(_) => {}
                        Err(e) => report.issues.push(format!(
                            "{prefix}: cannot resolve target {}: {e}",
                            target.display()
                        )),
                    }
                }
                OperationKind::CreateFolder => {
                    let folder = op.folder();
                    if folder.exists() && !folder.is_dir() {
                        report.issues.push(format!(
                            "{prefix}: path exists and is not a folder: {}",
                            folder.display()
                        ));
                    }
                }
                OperationKind::Delete => {
                    report.issues.push(format!(
                        "{prefix}: delete operations are not executed: {}",
                        op.source().display()
                    ));
                }
            }
        }

        report.valid = report.issues.is_empty();
        debug!(
            issues = report.issues.len(),
            warnings = report.warnings.len(),
            "validated batch"
        );
        report
    }

    /// Execute `operations` in order, `batch_size` at a time.
    ///
    /// Chunking only sets scheduling granularity. Each operation is
    /// executed and accounted on its own; a failure never stops the rest.
    pub fn execute_batch(&self, operations: &[Operation], batch_size: usize) -> OperationResult {
        self.execute_batch_with_cancel(operations, batch_size, &CancellationToken::new())
    }

    /// Like [`execute_batch`](Self::execute_batch), checking `cancel`
    /// before each operation. Operations not reached count as skipped.
    pub fn execute_batch_with_cancel(
        &self,
        operations: &[Operation],
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> OperationResult {
        let start = Instant::now();
        let mut result = OperationResult::new(operations.len());
        let batch_size = batch_size.max(1);

        info!(
            total = operations.len(),
            batch_size,
            dry_run = self.is_dry_run(),
            "executing operations"
        );

        for (chunk_index, chunk) in operations.chunks(batch_size).enumerate() {
            debug!(chunk = chunk_index, len = chunk.len(), "processing chunk");

            for op in chunk {
                if cancel.is_cancelled() {
                    result.cancelled = true;
                    result.record_skip(op.clone());
                    continue;
                }

                match self.execute(op) {
                    Ok(Outcome::Applied(applied)) => {
                        debug!(op = %applied, "applied");
                        result.record_success(applied);
                    }
                    Ok(Outcome::Unchanged) => {
                        debug!(op = %op, "nothing to do");
                        result.record_skip(op.clone());
                    }
                    Err(e) => {
                        warn!(op = %op, error = %e, "operation failed");
                        result.record_failure(op.clone(), e.to_string());
                    }
                }
            }
        }

        if result.cancelled {
            warn!(skipped = result.skipped_count, "execution cancelled");
        }

        result.duration = start.elapsed();
        info!("{}", result.summary());
        result
    }
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// The target path a Move or Rename asks for, before conflict resolution.
fn planned_target(op: &Operation) -> Result<PathBuf, OpError> {
    match op.kind() {
        OperationKind::Rename => rename_target(op.source(), op.target()),
        _ if op.target().as_os_str().is_empty() => {
            Err(OpError::validation("target path is empty"))
        }
        _ => Ok(op.target().to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_preview_counts_and_findings() {
        let temp = TempDir::new().unwrap();
        let d = temp.path();
        fs::write(d.join("a.txt"), "a").unwrap();
        fs::create_dir(d.join("docs")).unwrap();
        fs::write(d.join("docs/a.txt"), "old").unwrap();

        let ops = vec![
            Operation::create_folder(d.join("docs")),
            Operation::move_to(d.join("a.txt"), d.join("docs/a.txt")),
            Operation::move_to(d.join("ghost.txt"), d.join("new/ghost.txt")),
        ];

        let report = Operator::default().preview(&ops);
        assert_eq!(report.total(), 3);
        assert_eq!(report.count(OperationKind::Move), 2);
        assert_eq!(report.count(OperationKind::CreateFolder), 1);
        assert!(report.has_errors);
        assert_eq!(report.errors.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["has_errors"], true);
        assert_eq!(json["counts_by_type"]["move"], 2);
        assert!(report.warnings.iter().any(|w| w.contains("will be renamed")));
        assert!(report.warnings.iter().any(|w| w.contains("will be created")));
        assert!(report.warnings.iter().any(|w| w.contains("already exists")));
    }

    #[test]
    fn test_validate_reports_issues() {
        let temp = TempDir::new().unwrap();
        let d = temp.path();
        fs::write(d.join("a.txt"), "a").unwrap();

        let ops = vec![
            Operation::move_to(d.join("a.txt"), d.join("b/a.txt")),
            Operation::move_to(d.join("missing"), d.join("b/missing")),
            Operation::rename(d.join("a.txt"), ".."),
            Operation::delete(d.join("a.txt")),
        ];

        let report = Operator::default().validate(&ops);
        assert!(!report.is_valid());
        assert_eq!(report.issues.len(), 3);
        assert!(report.issues[0].starts_with("#1"));
        assert!(report.issues[2].contains("delete"));
    }

    #[test]
    fn test_validate_clean_batch() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();

        let ops = vec![Operation::rename(temp.path().join("a.txt"), "b.txt")];
        let report = Operator::default().validate(&ops);
        assert!(report.is_valid());
        assert_eq!(serde_json::to_value(&report).unwrap()["valid"], true);
    }

    #[test]
    fn test_zero_batch_size_still_runs() {
        let temp = TempDir::new().unwrap();
        let ops = vec![Operation::create_folder(temp.path().join("x"))];

        let result = Operator::default().execute_batch(&ops, 0);
        assert_eq!(result.success_count, 1);
    }
}
