//! Size and free-space probing for validation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Closest ancestor of `path` (or `path` itself) that exists.
pub fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    absolute
        .ancestors()
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

/// Free space available to the current user on the volume holding `path`.
///
/// `path` itself need not exist; the nearest existing ancestor is probed.
pub fn available_space(path: &Path) -> io::Result<u64> {
    let probe = nearest_existing_ancestor(path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no existing ancestor for {}", path.display()),
        )
    })?;
    fs2::available_space(probe)
}

/// Size of a file, or the total size of a directory tree.
pub fn path_size(path: &Path) -> u64 {
    match fs::symlink_metadata(path) {
        Ok(m) if m.is_dir() => dir_size(path),
        Ok(m) => m.len(),
        Err(_) => 0,
    }
}

fn dir_size(dir: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            match entry.metadata() {
                Ok(m) if m.is_dir() => size += dir_size(&entry.path()),
                Ok(m) => size += m.len(),
                Err(_) => {}
            }
        }
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_nearest_existing_ancestor() {
        let temp = TempDir::new().unwrap();
        let deep = temp.path().join("x/y/z.txt");
        assert_eq!(
            nearest_existing_ancestor(&deep).unwrap(),
            std::path::absolute(temp.path()).unwrap()
        );
    }

    #[test]
    fn test_path_size_recurses() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("d")).unwrap();
        fs::write(temp.path().join("d/a"), "12345").unwrap();
        fs::write(temp.path().join("b"), "123").unwrap();

        assert_eq!(path_size(temp.path()), 8);
        assert_eq!(path_size(&temp.path().join("b")), 3);
        assert_eq!(path_size(&temp.path().join("missing")), 0);
    }

    #[test]
    fn test_available_space_for_missing_target() {
        let temp = TempDir::new().unwrap();
        assert!(available_space(&temp.path().join("new/dir/file")).is_ok());
    }
}
