//! Size-based rotation for scheduler log files.
//!
//! `scheduler.log` and `scheduler-err.log` rotate past 10 MiB, keeping at
//! most 5 copies: `scheduler.log` → `.1` → `.2` → … → `.5`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum log file size before rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated copies kept.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` if it is at least `max_bytes` long.
///
/// Returns `true` if rotation occurred. A missing file is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;

    // launchd keeps appending to the same path.
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Rotate both scheduler logs under `home`; failures are logged, not raised.
pub fn rotate_logs(home: &Path) {
    let stdout_log = crate::paths::stdout_log_path(home);
    let stderr_log = crate::paths::stderr_log_path(home);

    for log_path in [&stdout_log, &stderr_log] {
        match rotate_if_needed(log_path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
            Ok(true) => tracing::info!(path = %log_path.display(), "log file rotated"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed")
            }
        }
    }
}

fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("scheduler.log");
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SMALL_LIMIT: u64 = 1024;

    fn write_bytes(path: &Path, len: usize, fill: u8) {
        fs::write(path, vec![fill; len]).unwrap();
    }

    #[test]
    fn small_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scheduler.log");
        write_bytes(&log, 10, b'x');
        assert!(!rotate_if_needed(&log, SMALL_LIMIT, 3).unwrap());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn oversized_file_moves_to_first_slot() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scheduler.log");
        write_bytes(&log, SMALL_LIMIT as usize + 1, b'x');

        assert!(rotate_if_needed(&log, SMALL_LIMIT, 3).unwrap());
        assert_eq!(fs::metadata(&log).unwrap().len(), 0);
        assert_eq!(
            fs::metadata(numbered_path(&log, 1)).unwrap().len(),
            SMALL_LIMIT + 1
        );
    }

    #[test]
    fn rotated_copies_are_capped_and_shifted() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("scheduler.log");
        for round in 1..=4u8 {
            write_bytes(&log, SMALL_LIMIT as usize, b'0' + round);
            rotate_if_needed(&log, SMALL_LIMIT, 3).unwrap();
        }
        for n in 1..=3 {
            assert!(numbered_path(&log, n).exists(), ".{n} should exist");
        }
        assert!(!numbered_path(&log, 4).exists());
        let newest = fs::read(numbered_path(&log, 1)).unwrap();
        assert_eq!(newest[0], b'4');
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("absent.log");
        assert!(!rotate_if_needed(&log, SMALL_LIMIT, 3).unwrap());
    }
}
