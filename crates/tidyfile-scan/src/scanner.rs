//! Two-phase directory scanner.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tidyfile_core::{FileRecord, ScanConfig, ScanError};

use crate::extract::{extract_metadata, sample_content, sample_pdf_text};

/// Directory scanner producing immutable [`FileRecord`]s.
///
/// Traversal is serial; extraction runs on a pool of `config.workers`
/// threads. Results are sorted by path.
#[derive(Debug, Default, Clone, Copy)]
pub struct Scanner;

impl Scanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }

    /// Scan `config.root`.
    pub fn scan(&self, config: &ScanConfig) -> Result<Vec<FileRecord>, ScanError> {
        self.scan_with_cancel(config, &CancellationToken::new())
    }

    /// Scan `config.root`, stopping early with [`ScanError::Interrupted`]
    /// once `cancel` fires.
    pub fn scan_with_cancel(
        &self,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileRecord>, ScanError> {
        let start = Instant::now();
        let root = resolve_root(&config.root)?;

        let candidates = self.collect_candidates(config, &root, cancel)?;
        let candidate_count = candidates.len();
        let records = self.extract_records(config, &candidates, cancel)?;

        info!(
            root = %root.display(),
            candidates = candidate_count,
            records = records.len(),
            elapsed = ?start.elapsed(),
            "scan complete"
        );
        Ok(records)
    }

    /// Walk `root` and return the paths of files passing the filters.
    ///
    /// `root` is expected to be an existing directory. Depth is counted in
    /// directories below `root`: files directly in `root` sit at depth 0 and
    /// files in directories deeper than `config.max_depth` are excluded.
    pub fn collect_candidates(
        &self,
        config: &ScanConfig,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, ScanError> {
        // jwalk counts the root itself as depth 0, so a file inside a
        // directory at depth d is yielded at depth d + 1.
        let max_depth = if config.recursive {
            config.max_depth.saturating_add(1)
        } else {
            1
        };

        let walker = WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true)
            .min_depth(1)
            .max_depth(max_depth);

        let mut candidates = Vec::new();

        for entry_result in walker {
            if cancel.is_cancelled() {
                return Err(ScanError::Interrupted);
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();
            let is_file = file_type.is_file() || (file_type.is_symlink() && path.is_file());
            if !is_file {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if !config.accepts(&file_name) {
                continue;
            }

            candidates.push(path);
        }

        debug!(count = candidates.len(), "collected scan candidates");
        Ok(candidates)
    }

    /// Build records for `candidates` on a bounded worker pool.
    ///
    /// A candidate that cannot be processed is dropped and logged; the
    /// returned list may be shorter than `candidates`.
    pub fn extract_records(
        &self,
        config: &ScanConfig,
        candidates: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<Vec<FileRecord>, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("tidyfile-extract-{i}"))
            .build()
            .map_err(|e| ScanError::InvalidConfig {
                message: e.to_string(),
            })?;

        let mut records: Vec<FileRecord> = pool.install(|| {
            candidates
                .par_iter()
                .filter_map(|path| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    match build_record(path, config) {
                        Ok(record) => Some(record),
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "dropping file from scan");
                            None
                        }
                    }
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(ScanError::Interrupted);
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }
}

/// Canonicalize the scan root and check it is a directory.
fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
    let root_path = root.canonicalize().map_err(|e| ScanError::io(root, e))?;
    let metadata = fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory { path: root_path });
    }
    Ok(root_path)
}

/// Stat a single file and build its record.
fn build_record(path: &Path, config: &ScanConfig) -> io::Result<FileRecord> {
    let path = std::path::absolute(path)?;
    let metadata = fs::metadata(&path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let size = metadata.len();

    let extracted = config
        .include_metadata
        .then(|| extract_metadata(&path, &extension));

    let content_sample = (config.include_content && size < config.max_content_bytes)
        .then(|| match extension.as_str() {
            "pdf" => sample_pdf_text(&path, config.sample_chars),
            _ => sample_content(&path, config.sample_chars),
        });

    Ok(FileRecord {
        name,
        extension,
        size,
        created: metadata.created().ok().map(DateTime::<Utc>::from),
        modified: DateTime::<Utc>::from(metadata.modified()?),
        metadata: extracted,
        content_sample,
        path,
    })
}

/// Group records by extension. Files without one go under `no_extension`.
pub fn group_by_extension(records: &[FileRecord]) -> BTreeMap<&str, Vec<&FileRecord>> {
    let mut groups: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
    for record in records {
        let key = if record.has_extension() {
            record.extension.as_str()
        } else {
            "no_extension"
        };
        groups.entry(key).or_default().push(record);
    }
    groups
}
