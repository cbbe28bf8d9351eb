//! Persisted index entities
//!
//! [`FileEntry`] is one row per known remote path; [`DirMtimeEntry`] is the
//! directory modification-time cache the delta detector prunes against.

use serde::{Deserialize, Serialize};

use super::paths::RemotePath;
use crate::ports::remote_directory::StatModel;

/// One known remote path and its last observed metadata
///
/// `mtime` is integer milliseconds since the Unix epoch, `0` when unknown.
/// `size` is `0` for directories. `last_synced` records when this row was
/// last written from remote truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: RemotePath,
    pub basename: String,
    pub is_dir: bool,
    pub mtime: i64,
    pub size: u64,
    pub etag: Option<String>,
    pub content_hash: Option<String>,
    pub last_synced: i64,
    pub parent_path: RemotePath,
}

impl FileEntry {
    /// Builds an entry from a remote stat, stamping `last_synced`
    ///
    /// The parent is derived from the path; the root's parent is itself.
    pub fn from_stat(stat: &StatModel, path: RemotePath, last_synced: i64) -> Self {
        let parent_path = path.parent().unwrap_or_else(RemotePath::root);
        Self {
            basename: stat.basename.clone(),
            is_dir: stat.is_dir,
            mtime: stat.mtime_ms,
            size: if stat.is_dir { 0 } else { stat.size },
            etag: None,
            content_hash: None,
            last_synced,
            parent_path,
            path,
        }
    }
}

/// Cached modification time for one known directory
///
/// While a directory's remote mtime still equals the cached value, none of
/// its immediate children have been added, removed, or renamed since the
/// entry was recorded. `child_count` is a hint and may be stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirMtimeEntry {
    pub path: RemotePath,
    pub mtime: i64,
    pub last_checked: i64,
    pub child_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(path: &str, is_dir: bool, mtime: i64, size: u64) -> StatModel {
        StatModel {
            path: path.to_string(),
            basename: path.rsplit('/').next().unwrap_or("").to_string(),
            is_dir,
            is_deleted: false,
            mtime_ms: mtime,
            size,
        }
    }

    #[test]
    fn test_from_stat_file() {
        let s = stat("/docs/a.txt", false, 100, 10);
        let path = RemotePath::new("/docs/a.txt").unwrap();
        let entry = FileEntry::from_stat(&s, path, 999);

        assert_eq!(entry.basename, "a.txt");
        assert_eq!(entry.parent_path.as_str(), "/docs");
        assert_eq!(entry.mtime, 100);
        assert_eq!(entry.size, 10);
        assert_eq!(entry.last_synced, 999);
        assert!(!entry.is_dir);
    }

    #[test]
    fn test_from_stat_directory_zeroes_size() {
        let s = stat("/docs", true, 100, 4096);
        let path = RemotePath::new("/docs").unwrap();
        let entry = FileEntry::from_stat(&s, path, 0);

        assert!(entry.is_dir);
        assert_eq!(entry.size, 0);
        assert!(entry.parent_path.is_root());
    }
}
