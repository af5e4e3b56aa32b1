//! File operations engine for tidyfile.
//!
//! This crate validates, previews and executes batches of operation
//! intents against the filesystem, and keeps a bounded stack of reverse
//! operations so applied batches can be undone.
//!
//! Execution is synchronous and strictly ordered: conflict resolution and
//! undo both depend on operations running in submission order.

mod conflict;
mod executor;
mod operator;
mod report;
mod space;
mod undo;

pub use conflict::{resolve_conflict, validate_filename};
pub use operator::{Operator, Outcome};
pub use report::{PreviewReport, ValidationReport};
pub use space::{available_space, nearest_existing_ancestor, path_size};
pub use undo::{
    ReverseAction, ReverseOutcome, UndoBatch, UndoEntry, UndoManager, UndoReport, UndoSummary,
};

// Re-export core types for convenience
pub use tidyfile_core::{OpError, Operation, OperationKind, OperationResult, OperatorConfig};

/// Default number of undo batches kept.
pub const DEFAULT_MAX_HISTORY: usize = 10;
