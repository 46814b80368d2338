//! Package metadata
//!
//! The "package" is the installed bundle. Its last update time decides
//! whether deployed assets are stale.

use crate::{Result, ServiceError};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Update time reported when package metadata cannot be read.
pub const UNKNOWN_UPDATE_TIME: i64 = 1;

pub trait PackageMetadata: Send + Sync {
    /// Last update time in milliseconds since the epoch.
    fn last_update_time(&self) -> Result<i64>;

    /// Like [`PackageMetadata::last_update_time`], but logs and falls back to
    /// [`UNKNOWN_UPDATE_TIME`] on failure.
    fn current_update_time(&self) -> i64 {
        match self.last_update_time() {
            Ok(time) => time,
            Err(err) => {
                tracing::error!(%err, "Package metadata unavailable");
                UNKNOWN_UPDATE_TIME
            }
        }
    }
}

/// Metadata derived from a bundle directory: the newest modification time
/// of anything inside it.
pub struct BundleMetadata {
    root: PathBuf,
}

impl BundleMetadata {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PackageMetadata for BundleMetadata {
    fn last_update_time(&self) -> Result<i64> {
        if !self.root.exists() {
            return Err(ServiceError::PackageNotFound(self.root.clone()));
        }
        newest_mtime(&self.root)
    }
}

fn newest_mtime(path: &Path) -> Result<i64> {
    let meta = std::fs::metadata(path).map_err(|e| ServiceError::io(path, e))?;
    let modified = meta.modified().map_err(|e| ServiceError::io(path, e))?;
    let mut newest = millis(modified);

    if meta.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|e| ServiceError::io(path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ServiceError::io(path, e))?;
            newest = newest.max(newest_mtime(&entry.path())?);
        }
    }
    Ok(newest)
}

fn millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bundle_falls_back_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let meta = BundleMetadata::new(dir.path().join("absent"));
        assert!(matches!(
            meta.last_update_time(),
            Err(ServiceError::PackageNotFound(_))
        ));
        assert_eq!(meta.current_update_time(), UNKNOWN_UPDATE_TIME);
    }

    #[test]
    fn test_bundle_time_tracks_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("deps/lib")).unwrap();
        std::fs::write(dir.path().join("deps/main.js"), "1").unwrap();
        std::fs::write(dir.path().join("deps/lib/util.js"), "2").unwrap();

        let meta = BundleMetadata::new(dir.path());
        let time = meta.last_update_time().unwrap();
        assert!(time > UNKNOWN_UPDATE_TIME);

        let file_time = millis(
            std::fs::metadata(dir.path().join("deps/lib/util.js"))
                .unwrap()
                .modified()
                .unwrap(),
        );
        assert!(time >= file_time);
    }
}
