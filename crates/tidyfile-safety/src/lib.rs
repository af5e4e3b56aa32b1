//! Safety layer for tidyfile.
//!
//! - [`BackupManager`] snapshots file hashes before a run and audits drift
//!   afterwards. It never copies or restores content.
//! - [`OperationLog`] appends one JSON line per executed operation.
//! - [`Session`] chains validation, backup, execution, logging and undo
//!   recording, and replays the undo stack.

mod backup;
mod error;
mod oplog;
mod session;

pub use backup::{
    BackupAudit, BackupManager, BackupManifest, BackupSummary, DriftStatus, FileSnapshot,
    hash_file,
};
pub use error::{Result, SafetyError};
pub use oplog::{LogRecord, LogStatus, OperationLog};
pub use session::{ExecuteOptions, Session, SessionOutcome, UndoOutcome};
