// Log Manager
// Log file location and retention for the dataset service

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const LOG_FILE_NAME: &str = "datalab-server.log";

const SECS_PER_DAY: u64 = 24 * 60 * 60;

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Remove `.log` files in `log_dir` untouched for more than `retention_days`.
/// The active service log is always kept. A retention of 0 disables pruning.
pub fn prune_logs(log_dir: &Path, retention_days: u32) -> io::Result<usize> {
    if retention_days == 0 || !log_dir.is_dir() {
        return Ok(0);
    }

    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(u64::from(retention_days) * SECS_PER_DAY))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let active = log_file_path(log_dir);

    let mut removed = 0;
    for entry in fs::read_dir(log_dir)?.flatten() {
        let path = entry.path();
        if path == active || path.extension().and_then(|ext| ext.to_str()) != Some("log") {
            continue;
        }

        let stale = entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .map(|modified| modified < cutoff)
            .unwrap_or(false);
        if !stale {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove old log {:?}: {e}", path),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn age(path: &Path, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * SECS_PER_DAY);
        File::options().write(true).open(path).unwrap().set_modified(when).unwrap();
    }

    #[test]
    fn test_prunes_only_stale_log_files() {
        let temp = tempdir().unwrap();
        let old = temp.path().join("datalab-server.1.log");
        let fresh = temp.path().join("datalab-server.2.log");
        let other = temp.path().join("notes.txt");
        for path in [&old, &fresh, &other] {
            fs::write(path, "x").unwrap();
        }
        age(&old, 30);
        age(&other, 30);

        assert_eq!(prune_logs(temp.path(), 14).unwrap(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_active_log_is_kept() {
        let temp = tempdir().unwrap();
        let active = log_file_path(temp.path());
        fs::write(&active, "x").unwrap();
        age(&active, 365);

        assert_eq!(prune_logs(temp.path(), 1).unwrap(), 0);
        assert!(active.exists());
    }

    #[test]
    fn test_zero_retention_or_missing_dir_is_noop() {
        let temp = tempdir().unwrap();
        let old = temp.path().join("old.log");
        fs::write(&old, "x").unwrap();
        age(&old, 30);

        assert_eq!(prune_logs(temp.path(), 0).unwrap(), 0);
        assert!(old.exists());
        assert_eq!(prune_logs(&temp.path().join("missing"), 7).unwrap(), 0);
    }
}
