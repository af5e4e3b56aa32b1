//! Aggregate outcome of a batch execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// An operation that failed, with its error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedOperation {
    pub operation: Operation,
    pub error: String,
}

/// How a single operation of a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Applied,
    Skipped,
    Failed,
}

/// One entry of the per-operation outcome list, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedOperation {
    pub operation: Operation,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of executing a batch of operations.
///
/// Every operation is accounted for exactly once:
/// `success_count + failed_count + skipped_count == total`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationResult {
    /// Number of operations submitted.
    pub total: usize,
    /// Operations applied.
    pub success_count: usize,
    /// Operations that raised an error.
    pub failed_count: usize,
    /// Operations that made no change.
    pub skipped_count: usize,
    /// Applied operations, with the target actually written.
    pub operations: Vec<Operation>,
    /// Operations counted as skipped.
    pub skipped: Vec<Operation>,
    /// Operations counted as failed.
    pub failures: Vec<FailedOperation>,
    /// Every accounted operation in the order it was processed.
    pub outcomes: Vec<ExecutedOperation>,
    /// Error messages, one per failure.
    pub errors: Vec<String>,
    /// Wall-clock duration of the batch.
    pub duration: Duration,
    /// Whether execution stopped early because of cancellation.
    pub cancelled: bool,
}

impl OperationResult {
    /// Create an empty result for `total` operations.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Record an applied operation.
    pub fn record_success(&mut self, applied: Operation) {
        self.success_count += 1;
        self.outcomes.push(ExecutedOperation {
            operation: applied.clone(),
            status: ExecutionStatus::Applied,
            error: None,
        });
        self.operations.push(applied);
    }

    /// Record an operation that made no change.
    pub fn record_skip(&mut self, operation: Operation) {
        self.skipped_count += 1;
        self.outcomes.push(ExecutedOperation {
            operation: operation.clone(),
            status: ExecutionStatus::Skipped,
            error: None,
        });
        self.skipped.push(operation);
    }

    /// Record a failed operation.
    pub fn record_failure(&mut self, operation: Operation, error: impl Into<String>) {
        let error = error.into();
        self.failed_count += 1;
        self.errors
            .push(format!("{}: {}", operation.source().display(), error));
        self.outcomes.push(ExecutedOperation {
            operation: operation.clone(),
            status: ExecutionStatus::Failed,
            error: Some(error.clone()),
        });
        self.failures.push(FailedOperation { operation, error });
    }

    /// Fraction of submitted operations that were applied.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total as f64
        }
    }

    /// Check if every operation was applied or skipped.
    pub fn is_success(&self) -> bool {
        self.failed_count == 0 && !self.cancelled
    }

    /// Some operations failed while others went through.
    pub fn is_partial_failure(&self) -> bool {
        self.failed_count > 0 && self.success_count > 0
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} of {} applied, {} failed, {} skipped in {:.2?}",
            self.success_count, self.total, self.failed_count, self.skipped_count, self.duration
        );
        if self.cancelled {
            text.push_str(" (cancelled)");
        }
        text
    }
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OperationResult(total={}, success={}, failed={}, rate={:.1}%)",
            self.total,
            self.success_count,
            self.failed_count,
            self.success_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_add_up() {
        let mut result = OperationResult::new(3);
        result.record_success(Operation::move_to("/a", "/b"));
        result.record_skip(Operation::create_folder("/c"));
        result.record_failure(Operation::move_to("/x", "/y"), "Source not found");

        assert_eq!(
            result.success_count + result.failed_count + result.skipped_count,
            result.total
        );
        assert!(result.is_partial_failure());
        assert!(!result.is_success());
        assert_eq!(result.errors, vec!["/x: Source not found".to_string()]);
    }

    #[test]
    fn test_outcomes_keep_execution_order() {
        let mut result = OperationResult::new(3);
        result.record_failure(Operation::move_to("/x", "/y"), "Source not found");
        result.record_success(Operation::move_to("/a", "/b"));
        result.record_skip(Operation::create_folder("/c"));

        let statuses: Vec<ExecutionStatus> = result.outcomes.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![
                ExecutionStatus::Failed,
                ExecutionStatus::Applied,
                ExecutionStatus::Skipped
            ]
        );
        assert_eq!(result.outcomes[0].error.as_deref(), Some("Source not found"));
    }

    #[test]
    fn test_success_rate_empty() {
        assert_eq!(OperationResult::new(0).success_rate(), 0.0);
    }

    #[test]
    fn test_success_rate() {
        let mut result = OperationResult::new(4);
        result.record_success(Operation::move_to("/a", "/b"));
        assert!((result.success_rate() - 0.25).abs() < f64::EPSILON);
    }
}
