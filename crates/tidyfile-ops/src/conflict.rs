//! Conflict resolution and name validation.

use std::path::{Path, PathBuf};

/// Find an unused path for `path`.
///
/// Returns `path` unchanged if nothing exists there. Otherwise probes
/// `stem_1.ext`, `stem_2.ext`, ... in the same directory and returns the
/// first free name.
pub fn resolve_conflict(path: &Path) -> PathBuf {
    if !occupied(path) {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter: u64 = 1;
    loop {
        let new_name = match &extension {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = parent.join(new_name);
        if !occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Existence check that also sees broken symlinks.
fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Validate a single file name for cross-platform compatibility.
pub fn validate_filename(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".into());
    }

    if name.len() > 255 {
        return Err("Name is too long (max 255 characters)".into());
    }

    for c in ['/', '\0'] {
        if name.contains(c) {
            return Err(format!("Name cannot contain '{}'", c.escape_default()));
        }
    }

    #[cfg(target_os = "windows")]
    {
        for c in ['\\', ':', '*', '?', '"', '<', '>', '|'] {
            if name.contains(c) {
                return Err(format!("Name cannot contain '{}'", c));
            }
        }
    }

    if name == "." || name == ".." {
        return Err("'.' and '..' are reserved names".into());
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err("Name cannot start or end with spaces".into());
    }

    Ok(())
}
