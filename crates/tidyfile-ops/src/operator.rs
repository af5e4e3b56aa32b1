//! Primitive mutators: move, rename and create-folder.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use tidyfile_core::{OpError, Operation, OperationKind, OperatorConfig};

use crate::conflict::{resolve_conflict, validate_filename};

/// What executing a single operation did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operation changed the filesystem (or would have, in dry-run).
    /// Carries the operation with the target actually written.
    Applied(Operation),
    /// Nothing needed doing.
    Unchanged,
}

/// Executes operation intents against the filesystem.
///
/// In dry-run mode the mutators run every check the real mutators run and
/// return the path they would have written, without touching anything.
#[derive(Debug, Clone, Default)]
pub struct Operator {
    config: OperatorConfig,
}

impl Operator {
    /// Create an operator with explicit configuration.
    pub fn new(config: OperatorConfig) -> Self {
        Self { config }
    }

    /// Create an operator that only reports what it would do.
    pub fn dry_run() -> Self {
        Self::new(OperatorConfig::default().with_dry_run(true))
    }

    /// The operator's configuration.
    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Check if this operator is in dry-run mode.
    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// Execute a single operation.
    pub fn execute(&self, operation: &Operation) -> Result<Outcome, OpError> {
        match operation.kind() {
            OperationKind::Move => {
                let written = self.move_file(operation.source(), operation.target())?;
                Ok(applied_unless_same(operation, written))
            }
            OperationKind::Rename => {
                let written = self.rename(operation.source(), operation.target())?;
                Ok(applied_unless_same(operation, written))
            }
            OperationKind::CreateFolder => {
                if self.create_folder(operation.folder())? {
                    Ok(Outcome::Applied(operation.clone()))
                } else {
                    Ok(Outcome::Unchanged)
                }
            }
            OperationKind::Delete => Err(OpError::validation(
                "delete operations are not executed",
            )),
        }
    }

    /// Move `source` to `target`, returning the path written.
    ///
    /// Missing parent directories of `target` are created. If `target` is
    /// occupied the incoming item is renamed (`stem_N.ext`); nothing that
    /// already exists is ever overwritten.
    pub fn move_file(&self, source: &Path, target: &Path) -> Result<PathBuf, OpError> {
        check_source(source)?;

        if same_path(source, target) {
            debug!(path = %source.display(), "move target equals source");
            return Ok(source.to_path_buf());
        }

        if source.is_dir() && is_inside(source, target) {
            return Err(OpError::validation(format!(
                "cannot move {} into itself",
                source.display()
            )));
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ensure_dir(parent)?;
        }

        let final_target = resolve_conflict(target);
        if final_target != target {
            info!(
                requested = %target.display(),
                resolved = %final_target.display(),
                "target occupied, renaming incoming item"
            );
        }

        if self.is_dry_run() {
            info!(source = %source.display(), target = %final_target.display(), "[dry run] move");
            return Ok(final_target);
        }

        move_item(source, &final_target)?;
        debug!(source = %source.display(), target = %final_target.display(), "moved");
        Ok(final_target)
    }

    /// Rename `source`, returning the path written.
    ///
    /// `new_name` is either a bare name (renamed in place), a relative path
    /// (resolved against the source's directory) or an absolute path.
    pub fn rename(&self, source: &Path, new_name: &Path) -> Result<PathBuf, OpError> {
        let target = rename_target(source, new_name)?;
        self.move_file(source, &target)
    }

    /// Create `path` and any missing parents.
    ///
    /// Returns `false` when the folder already existed. Calling this twice
    /// is never an error.
    pub fn create_folder(&self, path: &Path) -> Result<bool, OpError> {
        if path.as_os_str().is_empty() {
            return Err(OpError::validation("folder path is empty"));
        }
        match fs::metadata(path) {
            Ok(m) if m.is_dir() => return Ok(false),
            Ok(_) => {
                return Err(OpError::NotADirectory {
                    path: path.to_path_buf(),
                });
            }
            Err(_) => {}
        }

        if self.is_dry_run() {
            info!(path = %path.display(), "[dry run] create folder");
            return Ok(true);
        }

        fs::create_dir_all(path).map_err(|e| OpError::io(path, e))?;
        debug!(path = %path.display(), "created folder");
        Ok(true)
    }

    /// Remove `path` if it is an empty directory.
    ///
    /// Returns `false` without error when the folder is missing or still
    /// has entries.
    pub fn remove_empty_folder(&self, path: &Path) -> Result<bool, OpError> {
        if !path.is_dir() {
            return Ok(false);
        }
        let mut entries = fs::read_dir(path).map_err(|e| OpError::io(path, e))?;
        if entries.next().is_some() {
            info!(path = %path.display(), "folder not empty, leaving it in place");
            return Ok(false);
        }

        if self.is_dry_run() {
            info!(path = %path.display(), "[dry run] remove empty folder");
            return Ok(true);
        }

        fs::remove_dir(path).map_err(|e| OpError::io(path, e))?;
        debug!(path = %path.display(), "removed empty folder");
        Ok(true)
    }

    /// Make sure `dir` exists as a directory (a no-op in dry-run).
    fn ensure_dir(&self, dir: &Path) -> Result<(), OpError> {
        match fs::metadata(dir) {
            Ok(m) if m.is_dir() => Ok(()),
            Ok(_) => Err(OpError::NotADirectory {
                path: dir.to_path_buf(),
            }),
            Err(_) if self.is_dry_run() => Ok(()),
            Err(_) => fs::create_dir_all(dir).map_err(|e| OpError::io(dir, e)),
        }
    }
}

fn applied_unless_same(operation: &Operation, written: PathBuf) -> Outcome {
    if written == operation.source() {
        Outcome::Unchanged
    } else {
        Outcome::Applied(operation.with_resolved_target(written))
    }
}

fn check_source(source: &Path) -> Result<(), OpError> {
    fs::symlink_metadata(source)
        .map(|_| ())
        .map_err(|e| OpError::io(source, e))
}

/// Compute the full target path of a rename.
pub(crate) fn rename_target(source: &Path, new_name: &Path) -> Result<PathBuf, OpError> {
    if new_name.is_absolute() {
        return Ok(new_name.to_path_buf());
    }

    let mut components = new_name.components();
    if let (Some(Component::Normal(name)), None) = (components.next(), components.next()) {
        validate_filename(&name.to_string_lossy()).map_err(OpError::validation)?;
    } else if new_name.file_name().is_none() {
        return Err(OpError::validation(format!(
            "invalid rename target '{}'",
            new_name.display()
        )));
    }

    let parent = source.parent().unwrap_or(Path::new(""));
    Ok(parent.join(new_name))
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// Check if `target` lies inside the directory `source`.
fn is_inside(source: &Path, target: &Path) -> bool {
    let source = source.canonicalize().unwrap_or_else(|_| source.to_path_buf());
    let target = std::path::absolute(target).unwrap_or_else(|_| target.to_path_buf());
    target.starts_with(&source)
}

/// Move a single item (file or directory).
fn move_item(source: &Path, dest: &Path) -> Result<(), OpError> {
    // Fast path for same filesystem
    match fs::rename(source, dest) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {}
        Err(e) => return Err(OpError::io(source, e)),
    }

    // Fall back to copy + delete for cross-filesystem moves
    if source.is_dir() {
        copy_dir_recursive(source, dest).map_err(|e| OpError::io(dest, e))?;
        fs::remove_dir_all(source).map_err(|e| OpError::io(source, e))?;
    } else {
        fs::copy(source, dest).map_err(|e| OpError::io(dest, e))?;
        fs::remove_file(source).map_err(|e| OpError::io(source, e))?;
    }
    Ok(())
}

/// Recursively copy a directory (for cross-filesystem moves).
fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path)?;
        }
    }
    Ok(())
}
