//! Error types for scanning, operation execution and plan parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while scanning a directory.
///
/// Only failures of the scan as a whole are reported here. Per-file
/// problems are dropped by the scanner and never reach the caller.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan was cancelled before it finished.
    #[error("Scan interrupted")]
    Interrupted,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors raised by a single file operation.
///
/// Inside a batch these are never propagated: the executor turns each one
/// into a failure entry of the batch result and moves on.
#[derive(Debug, Error)]
pub enum OpError {
    /// Source file or directory is missing.
    #[error("Source not found: {path}")]
    NotFound { path: PathBuf },

    /// Path exists but has the wrong type.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// OS-level access failure.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Pre-flight check failed; the operation was never attempted.
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Execution was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl OpError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// Errors raised while parsing operation intents from a planner.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The payload is not valid JSON or carries an unknown operation type.
    #[error("Malformed plan: {0}")]
    Json(#[from] serde_json::Error),

    /// An intent parsed but failed validation.
    #[error("Invalid operation at index {index}: {message}")]
    InvalidIntent { index: usize, message: String },
}

/// Errors raised while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`TidyConfig`](crate::TidyConfig).
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
