//! Read-only reports produced before a batch runs.

use std::collections::BTreeMap;

use serde::Serialize;

use tidyfile_core::OperationKind;

/// What a batch would do, without touching the filesystem.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreviewReport {
    /// Number of operations of each kind.
    pub counts_by_type: BTreeMap<OperationKind, usize>,
    /// Conditions that do not stop an operation (occupied targets, missing
    /// parent directories).
    pub warnings: Vec<String>,
    /// Conditions that make an operation fail (missing sources).
    pub errors: Vec<String>,
    /// Whether `errors` is non-empty.
    pub has_errors: bool,
}

impl PreviewReport {
    /// Total number of operations previewed.
    pub fn total(&self) -> usize {
        self.counts_by_type.values().sum()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.counts_by_type.get(&kind).copied().unwrap_or(0)
    }
}

/// Pre-flight check of a batch.
///
/// Advisory only: the executor never consults it. Whether issues block a
/// run is the caller's decision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// True when no issue was found.
    pub valid: bool,
    /// Hard problems.
    pub issues: Vec<String>,
    /// Soft problems.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A batch is valid when no issue was found.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "valid ({} warnings)", self.warnings.len())
        } else {
            write!(f, "invalid: {}", self.issues.join("; "))
        }
    }
}
