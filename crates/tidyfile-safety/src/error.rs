//! Error types for the safety layer.

use std::path::PathBuf;

use thiserror::Error;

use tidyfile_core::OpError;

/// Errors raised by backups, the operation log and sessions.
#[derive(Debug, Error)]
pub enum SafetyError {
    /// No manifest exists for the requested backup id.
    #[error("Backup not found: {id}")]
    BackupNotFound { id: String },

    /// I/O error on the backup store, log or undo file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest or undo file could not be parsed or written.
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A file operation failed outside a batch.
    #[error(transparent)]
    Operation(#[from] OpError),

    /// Pre-flight validation found issues and the run was not started.
    #[error("Validation failed with {} issue(s): {}", issues.len(), issues.join("; "))]
    ValidationFailed { issues: Vec<String> },
}

impl SafetyError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a JSON error with path context.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for the safety layer.
pub type Result<T> = std::result::Result<T, SafetyError>;
