//! Provenance snapshots taken before a batch runs.
//!
//! A backup point records the hash, size and modification time of each
//! file. It does not copy content: "restoring" a backup audits the current
//! state against the snapshot and reports drift. Actual rollback is the
//! undo stack's job.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SafetyError};

const MANIFEST_FILE: &str = "manifest.json";
const HASH_CHUNK: usize = 64 * 1024;

/// Recorded state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: PathBuf,
    /// BLAKE3 hex digest; absent when the file did not exist or could not
    /// be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    pub exists: bool,
}

impl FileSnapshot {
    fn take(path: &Path) -> Self {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            _ => {
                return Self {
                    path,
                    hash: None,
                    size: None,
                    mtime: None,
                    exists: false,
                };
            }
        };

        let hash = match hash_file(&path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not hash file");
                None
            }
        };

        Self {
            hash,
            size: Some(metadata.len()),
            mtime: metadata.modified().ok().map(DateTime::<Utc>::from),
            exists: true,
            path,
        }
    }
}

/// A persisted backup point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_id: String,
    pub timestamp: DateTime<Utc>,
    pub files: Vec<FileSnapshot>,
}

/// Listing entry for a stored backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub backup_id: String,
    pub timestamp: DateTime<Utc>,
    pub file_count: usize,
}

/// How a file compares to its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    /// Still present with the recorded content.
    Unchanged,
    /// Present at snapshot time, gone now (moved or deleted).
    Missing,
    /// Present with different content.
    Modified,
    /// Absent at snapshot time, present now.
    Appeared,
    /// Absent then and now.
    Absent,
}

/// Result of auditing a backup against the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct BackupAudit {
    pub backup_id: String,
    pub files: Vec<(PathBuf, DriftStatus)>,
}

impl BackupAudit {
    fn with_status(&self, status: DriftStatus) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|(_, s)| *s == status)
            .map(|(p, _)| p.as_path())
            .collect()
    }

    /// Files that were moved or deleted since the snapshot.
    pub fn missing(&self) -> Vec<&Path> {
        self.with_status(DriftStatus::Missing)
    }

    /// Files whose content changed since the snapshot.
    pub fn modified(&self) -> Vec<&Path> {
        self.with_status(DriftStatus::Modified)
    }

    pub fn unchanged(&self) -> Vec<&Path> {
        self.with_status(DriftStatus::Unchanged)
    }

    /// Check if nothing drifted.
    pub fn is_clean(&self) -> bool {
        self.files
            .iter()
            .all(|(_, s)| matches!(s, DriftStatus::Unchanged | DriftStatus::Absent))
    }
}

/// Stores backup manifests under `<dir>/<backup_id>/manifest.json`.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    /// Create a manager rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot `paths` and persist the manifest. Returns the backup id.
    ///
    /// Ids are derived from the local time; calls within the same second
    /// get a `_N` suffix so ids never collide.
    pub fn create_backup_point<P: AsRef<Path>>(&self, paths: &[P]) -> Result<String> {
        fs::create_dir_all(&self.dir).map_err(|e| SafetyError::io(&self.dir, e))?;

        let timestamp = Utc::now();
        let (backup_id, backup_dir) = self.claim_id(&timestamp.with_timezone(&Local))?;

        let manifest = BackupManifest {
            backup_id: backup_id.clone(),
            timestamp,
            files: paths.iter().map(|p| FileSnapshot::take(p.as_ref())).collect(),
        };

        let manifest_path = backup_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| SafetyError::json(&manifest_path, e))?;
        fs::write(&manifest_path, json).map_err(|e| SafetyError::io(&manifest_path, e))?;

        info!(backup = %backup_id, files = manifest.files.len(), "created backup point");
        Ok(backup_id)
    }

    /// Reserve a fresh backup directory by creating it.
    fn claim_id(&self, now: &DateTime<Local>) -> Result<(String, PathBuf)> {
        let base = now.format("%Y%m%d_%H%M%S").to_string();
        let mut counter: u32 = 0;
        loop {
            let id = if counter == 0 {
                base.clone()
            } else {
                format!("{base}_{counter}")
            };
            let path = self.dir.join(&id);
            match fs::create_dir(&path) {
                Ok(()) => return Ok((id, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
                Err(e) => return Err(SafetyError::io(path, e)),
            }
        }
    }

    /// Read the manifest of `backup_id`.
    pub fn manifest(&self, backup_id: &str) -> Result<BackupManifest> {
        let path = self.backup_path(backup_id)?.join(MANIFEST_FILE);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SafetyError::BackupNotFound {
                    id: backup_id.to_string(),
                });
            }
            Err(e) => return Err(SafetyError::io(&path, e)),
        };
        serde_json::from_str(&json).map_err(|e| SafetyError::json(&path, e))
    }

    /// Compare the current filesystem against the backup's snapshot.
    ///
    /// This never writes to the filesystem and cannot bring back content
    /// that changed or vanished; it only reports which files drifted.
    pub fn restore_backup(&self, backup_id: &str) -> Result<BackupAudit> {
        let manifest = self.manifest(backup_id)?;

        let files = manifest
            .files
            .into_iter()
            .map(|snapshot| {
                let status = drift(&snapshot);
                match status {
                    DriftStatus::Missing => {
                        warn!(path = %snapshot.path.display(), "file moved or deleted since backup")
                    }
                    DriftStatus::Modified => {
                        warn!(path = %snapshot.path.display(), "file modified since backup")
                    }
                    _ => debug!(path = %snapshot.path.display(), ?status, "checked"),
                }
                (snapshot.path, status)
            })
            .collect();

        Ok(BackupAudit {
            backup_id: manifest.backup_id,
            files,
        })
    }

    /// Stored backups, newest first. Unreadable manifests are skipped.
    pub fn list_backups(&self) -> Result<Vec<BackupSummary>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SafetyError::io(&self.dir, e)),
        };

        let mut backups = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.manifest(&id) {
                Ok(manifest) => backups.push(BackupSummary {
                    backup_id: manifest.backup_id,
                    timestamp: manifest.timestamp,
                    file_count: manifest.files.len(),
                }),
                Err(e) => warn!(backup = %id, error = %e, "skipping unreadable backup"),
            }
        }

        backups.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.backup_id.cmp(&a.backup_id))
        });
        Ok(backups)
    }

    /// Remove a stored backup. Returns false if it did not exist.
    pub fn delete_backup(&self, backup_id: &str) -> Result<bool> {
        let path = self.backup_path(backup_id)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(backup = %backup_id, "deleted backup");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SafetyError::io(path, e)),
        }
    }

    /// Directory of `backup_id`. Ids that are not a single path component
    /// are treated as unknown.
    fn backup_path(&self, backup_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(backup_id).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Ok(self.dir.join(backup_id)),
            _ => Err(SafetyError::BackupNotFound {
                id: backup_id.to_string(),
            }),
        }
    }
}

fn drift(snapshot: &FileSnapshot) -> DriftStatus {
    let current = fs::metadata(&snapshot.path).ok().filter(|m| m.is_file());

    match (snapshot.exists, current) {
        (false, None) => DriftStatus::Absent,
        (false, Some(_)) => DriftStatus::Appeared,
        (true, None) => DriftStatus::Missing,
        (true, Some(metadata)) => {
            let same = match &snapshot.hash {
                Some(expected) => hash_file(&snapshot.path).is_ok_and(|h| &h == expected),
                None => {
                    snapshot.size == Some(metadata.len())
                        && snapshot.mtime == metadata.modified().ok().map(DateTime::<Utc>::from)
                }
            };
            if same {
                DriftStatus::Unchanged
            } else {
                DriftStatus::Modified
            }
        }
    }
}

/// BLAKE3 hex digest of a file, read in fixed-size chunks.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
