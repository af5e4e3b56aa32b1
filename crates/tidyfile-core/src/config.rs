//! Configuration types.
//!
//! Every component takes its configuration explicitly at construction time.
//! `TidyConfig` only aggregates defaults for front ends that want to load
//! them from a TOML file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for scanning a directory.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Directory to scan.
    pub root: PathBuf,

    /// Descend into subdirectories.
    #[builder(default = "false")]
    #[serde(default)]
    pub recursive: bool,

    /// Extensions to include (empty = all). Leading dots are ignored.
    #[builder(default)]
    #[serde(default)]
    pub extensions: BTreeSet<String>,

    /// Maximum directory depth below the root whose files are included.
    #[builder(default = "5")]
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Extract format-specific metadata.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_metadata: bool,

    /// Sample the beginning of each file's text content.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_content: bool,

    /// Files at or above this size are never content-sampled.
    #[builder(default = "DEFAULT_MAX_CONTENT_BYTES")]
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,

    /// Number of characters kept in a content sample.
    #[builder(default = "1000")]
    #[serde(default = "default_sample_chars")]
    pub sample_chars: usize,

    /// Worker threads for metadata and content extraction.
    #[builder(default = "4")]
    #[serde(default = "default_workers")]
    pub workers: usize,
}

const DEFAULT_MAX_CONTENT_BYTES: u64 = 100 * 1024 * 1024;

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    5
}

fn default_max_content_bytes() -> u64 {
    DEFAULT_MAX_CONTENT_BYTES
}

fn default_sample_chars() -> usize {
    1000
}

fn default_workers() -> usize {
    4
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if self.workers == Some(0) {
            return Err("Worker count must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a non-recursive config with default limits.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            extensions: BTreeSet::new(),
            max_depth: default_max_depth(),
            include_metadata: true,
            include_content: false,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            sample_chars: default_sample_chars(),
            workers: default_workers(),
        }
    }

    /// Check whether a file name passes the hidden-file and extension filters.
    pub fn accepts(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.extensions
            .iter()
            .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Configuration for the operation executor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Report what would happen without touching the filesystem.
    #[serde(default)]
    pub dry_run: bool,

    /// Number of operations scheduled per chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    50
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: default_batch_size(),
        }
    }
}

impl OperatorConfig {
    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the chunk size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Front-end defaults, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TidyConfig {
    /// Directory holding backups, operation logs and the undo stack.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Operations per scheduling chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Undo batches kept before the oldest is evicted.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Maximum scan depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Content sampling size limit in MiB.
    #[serde(default = "default_max_content_mb")]
    pub max_content_mb: u64,

    /// Days of operation logs kept by cleanup.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    /// Take a backup point before executing a plan.
    #[serde(default = "default_true")]
    pub create_backup: bool,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tidyfile")
}

fn default_max_history() -> usize {
    10
}

fn default_max_content_mb() -> u64 {
    100
}

fn default_log_retention_days() -> u32 {
    30
}

impl Default for TidyConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            batch_size: default_batch_size(),
            max_history: default_max_history(),
            max_depth: default_max_depth(),
            max_content_mb: default_max_content_mb(),
            log_retention_days: default_log_retention_days(),
            create_backup: true,
        }
    }
}

impl TidyConfig {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tidyfile")
            .join("config.toml")
    }

    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Directory for backup manifests.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Directory for operation logs.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// File holding the persisted undo stack.
    pub fn undo_path(&self) -> PathBuf {
        self.data_dir.join("undo.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .root("/home/user")
            .recursive(true)
            .max_depth(2usize)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert!(config.recursive);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.workers, 4);
        assert!(config.include_metadata);
    }

    #[test]
    fn test_builder_rejects_missing_root() {
        assert!(ScanConfig::builder().build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_workers() {
        let result = ScanConfig::builder().root("/tmp").workers(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_accepts_skips_hidden() {
        let config = ScanConfig::new("/test");
        assert!(!config.accepts(".DS_Store"));
        assert!(config.accepts("notes.txt"));
    }

    #[test]
    fn test_accepts_extension_filter() {
        let mut config = ScanConfig::new("/test");
        config.extensions.insert(".PDF".to_string());
        config.extensions.insert("txt".to_string());

        assert!(config.accepts("report.pdf"));
        assert!(config.accepts("a.TXT"));
        assert!(!config.accepts("image.png"));
        assert!(!config.accepts("Makefile"));
    }

    #[test]
    fn test_tidy_config_partial_toml() {
        let config = TidyConfig::from_toml("batch_size = 10\nmax_history = 3\n").unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_history, 3);
        assert_eq!(config.log_retention_days, 30);
        assert!(config.create_backup);
    }

    #[test]
    fn test_tidy_config_missing_file_is_default() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = TidyConfig::load(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.batch_size, 50);
    }

    #[test]
    fn test_tidy_config_load_reports_parse_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "batch_size = \"many\"\n").unwrap();

        let err = TidyConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_tidy_config_load_reports_io_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = TidyConfig::load(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
