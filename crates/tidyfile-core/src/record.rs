//! Immutable file records produced by a scan.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use humansize::{BINARY, format_size};
use serde::{Deserialize, Serialize};

/// Format-specific metadata (mime type, image dimensions, ...).
pub type MetadataMap = BTreeMap<String, serde_json::Value>;

/// Snapshot of a single file taken at scan time.
///
/// Records are never updated. A later scan produces new records; a record
/// whose file has since moved is simply stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path.
    pub path: PathBuf,
    /// File name including extension.
    pub name: String,
    /// Lower-cased extension without the leading dot (empty if none).
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time, if the platform reports one.
    pub created: Option<DateTime<Utc>>,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Extracted metadata, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataMap>,
    /// Leading text content, when requested and the file is small enough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sample: Option<String>,
}

impl FileRecord {
    /// Human-readable size.
    pub fn size_human(&self) -> String {
        format_size(self.size, BINARY)
    }

    /// Check whether the record carries an extension.
    pub fn has_extension(&self) -> bool {
        !self.extension.is_empty()
    }
}

impl std::fmt::Display for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, .{})",
            self.name,
            self.size_human(),
            self.extension
        )
    }
}
