//! Change records produced by the delta detector

use serde::{Deserialize, Serialize};

use super::paths::RemotePath;
use crate::ports::remote_directory::StatModel;

/// What happened to a path since the last observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One detected remote change
///
/// `stat` carries the current remote metadata for `Added` and `Modified`
/// changes and is `None` for `Deleted`. Change lists are sets: no ordering
/// is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: RemotePath,
    pub kind: ChangeKind,
    pub stat: Option<StatModel>,
}

impl FileChange {
    /// An addition carrying the current remote stat
    pub fn added(path: RemotePath, stat: StatModel) -> Self {
        Self {
            path,
            kind: ChangeKind::Added,
            stat: Some(stat),
        }
    }

    /// A modification carrying the current remote stat
    pub fn modified(path: RemotePath, stat: StatModel) -> Self {
        Self {
            path,
            kind: ChangeKind::Modified,
            stat: Some(stat),
        }
    }

    /// A deletion
    pub fn deleted(path: RemotePath) -> Self {
        Self {
            path,
            kind: ChangeKind::Deleted,
            stat: None,
        }
    }
}

/// Result of one non-destructive detection pass
#[derive(Debug, Clone, Default)]
pub struct DeltaDetectionResult {
    /// Per-path changes found in changed directories
    pub changes: Vec<FileChange>,
    /// True when the cache cannot support incremental detection and the
    /// caller must fall back to a full scan
    pub need_full_scan: bool,
    /// Number of directories stat'd during the pass
    pub scanned_dirs: u64,
    /// Directories whose mtime differed from cache (or could not be stat'd)
    pub changed_dirs: Vec<RemotePath>,
}

impl DeltaDetectionResult {
    /// A result that only signals the full-scan fallback
    #[must_use]
    pub fn full_scan_needed() -> Self {
        Self {
            need_full_scan: true,
            ..Self::default()
        }
    }
}

/// Exact counts produced by a completed full scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanTotals {
    pub file_count: u64,
    pub dir_count: u64,
}

/// Index statistics reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub file_count: u64,
    pub dir_count: u64,
    pub has_index: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_constructors() {
        let path = RemotePath::new("/a.txt").unwrap();
        let stat = StatModel {
            path: "/a.txt".to_string(),
            basename: "a.txt".to_string(),
            is_dir: false,
            is_deleted: false,
            mtime_ms: 100,
            size: 10,
        };

        let added = FileChange::added(path.clone(), stat.clone());
        assert_eq!(added.kind, ChangeKind::Added);
        assert!(added.stat.is_some());

        let deleted = FileChange::deleted(path);
        assert_eq!(deleted.kind, ChangeKind::Deleted);
        assert!(deleted.stat.is_none());
    }

    #[test]
    fn test_change_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Deleted).unwrap(),
            "\"deleted\""
        );
        let kind: ChangeKind = serde_json::from_str("\"added\"").unwrap();
        assert_eq!(kind, ChangeKind::Added);
    }

    #[test]
    fn test_full_scan_needed() {
        let result = DeltaDetectionResult::full_scan_needed();
        assert!(result.need_full_scan);
        assert!(result.changes.is_empty());
        assert_eq!(result.scanned_dirs, 0);
    }
}
