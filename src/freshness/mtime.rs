//! Mtime-based freshness detection.
//!
//! Outputs are always written by kiln itself, so comparing the source mtime
//! against the output mtime is reliable enough to skip unchanged inputs.

use std::path::Path;
use std::time::SystemTime;

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Check if output file is at least as new as the given source mtime
///
/// `false` when the output is missing or the source mtime is unknown.
pub fn is_output_fresh(output: &Path, source_mtime: Option<SystemTime>) -> bool {
    let Some(source_time) = source_mtime else {
        return false;
    };

    get_mtime(output).is_some_and(|output_time| output_time >= source_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, at: SystemTime) {
        fs::write(path, "x").unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(at)
            .unwrap();
    }

    #[test]
    fn test_missing_output_is_stale() {
        let dir = TempDir::new().unwrap();
        assert!(!is_output_fresh(&dir.path().join("nope"), Some(SystemTime::now())));
    }

    #[test]
    fn test_fresh_and_stale() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.png");
        let out = dir.path().join("a.webp");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let t1 = t0 + Duration::from_secs(10);

        touch(&src, t0);
        touch(&out, t1);
        assert!(is_output_fresh(&out, get_mtime(&src)));

        touch(&src, t1 + Duration::from_secs(10));
        assert!(!is_output_fresh(&out, get_mtime(&src)));
    }
}
