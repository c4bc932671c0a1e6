//! Path normalization.
//!
//! Watcher events, config roots and runner outputs all pass through
//! [`normalize_path`] so they compare equal regardless of symlinks or a
//! relative working directory.

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute (e.g. a file that was just removed)
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_removed_file_keeps_path() {
        let path = Path::new("/absolute/path/removed.scss");
        assert_eq!(normalize_path(path), path);
    }

    #[test]
    fn test_normalize_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("relative/path/file.txt"));
    }

    #[test]
    fn test_normalize_resolves_parent_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("a");
        std::fs::create_dir(&dir).unwrap();
        let dotted = dir.join("..").join("a");
        assert_eq!(normalize_path(&dotted), normalize_path(&dir));
    }
}
