//! Hierarchical remote delta detection
//!
//! The [`DeltaDetector`] compares the remote tree against the persisted
//! index without re-enumerating everything. Directories are walked from the
//! base downward; any directory whose current mtime equals the cached value
//! is pruned along with its whole subtree. Directories found changed get a
//! file-level diff of their immediate children.
//!
//! ## Recursion shape
//!
//! Descent covers the union of the subdirectories currently listed by the
//! remote and the cached child directories, so a directory that vanished
//! remotely is still visited, stat'd empty, and reported as deleted with
//! its cached children.
//!
//! ## Failure posture
//!
//! - A failed depth-0 stat marks the directory changed and continues; the
//!   cost is over-scanning, never a missed change.
//! - A failed depth-1 listing during the diff skips that directory's diff
//!   entirely. An unreachable listing must not be read as an empty
//!   directory, or every prior child would be reported deleted.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use tracing::{debug, info, warn};

use davdex_core::domain::{
    ChangeKind, DeltaDetectionResult, DirMtimeEntry, FileChange, FileEntry, RemotePath,
    ScanTotals, SyncPhase, SyncProgress,
};
use davdex_core::ports::remote_directory::{Depth, StatModel};
use davdex_core::ports::{IFileIndex, IRemoteDirectory};

/// Page size for reading cached children during the file-level diff
const DIFF_PAGE_SIZE: u32 = 500;

/// Current time in integer milliseconds since epoch
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A directory found changed during the hierarchical walk
#[derive(Debug, Clone)]
struct ChangedDir {
    path: RemotePath,
    /// True when the depth-0 stat came back empty (target gone)
    deleted: bool,
}

/// Shared counters for a full scan in flight
struct ScanState {
    session_id: String,
    start_time_ms: i64,
    entries_seen: AtomicU64,
    file_count: AtomicU64,
    dir_count: AtomicU64,
}

/// Detects remote changes against the persisted index
///
/// Non-destructive by itself; callers apply detection output through
/// [`DeltaDetector::update_file_index`] and
/// [`DeltaDetector::update_dir_mtime_cache`], or rebuild everything with
/// [`DeltaDetector::full_scan`].
pub struct DeltaDetector {
    remote: Arc<dyn IRemoteDirectory>,
    index: Arc<dyn IFileIndex>,
    base_dir: RemotePath,
    concurrency: usize,
}

impl DeltaDetector {
    /// Creates a detector rooted at `base_dir`
    ///
    /// `concurrency` bounds the fan-out over sibling subdirectories; the
    /// conventional default is 5.
    pub fn new(
        remote: Arc<dyn IRemoteDirectory>,
        index: Arc<dyn IFileIndex>,
        base_dir: RemotePath,
        concurrency: usize,
    ) -> Self {
        Self {
            remote,
            index,
            base_dir,
            concurrency: concurrency.max(1),
        }
    }

    /// The directory this detector is rooted at
    pub fn base_dir(&self) -> &RemotePath {
        &self.base_dir
    }

    // ========================================================================
    // Detection
    // ========================================================================

    /// Runs one non-destructive detection pass
    ///
    /// Returns `need_full_scan` when the directory mtime cache is empty or
    /// does not cover the base directory (a cache that lost its root cannot
    /// be trusted for pruning decisions).
    pub async fn detect_changes(&self) -> Result<DeltaDetectionResult> {
        let cached_dirs = self
            .index
            .dir_all()
            .await
            .context("Failed to load directory mtime cache")?;

        if cached_dirs.is_empty() {
            info!("Directory mtime cache is empty, full scan required");
            return Ok(DeltaDetectionResult::full_scan_needed());
        }

        let mtimes: HashMap<String, i64> = cached_dirs
            .iter()
            .map(|e| (e.path.as_str().to_string(), e.mtime))
            .collect();

        if !mtimes.contains_key(self.base_dir.as_str()) {
            warn!(
                base = %self.base_dir,
                "Directory mtime cache has no record of the base directory; \
                 treating the cache as invalid"
            );
            return Ok(DeltaDetectionResult::full_scan_needed());
        }

        // Immediate cached children per directory, so vanished directories
        // are still visited during the walk.
        let mut cached_children: HashMap<String, Vec<RemotePath>> = HashMap::new();
        for entry in &cached_dirs {
            if let Some(parent) = entry.path.parent() {
                cached_children
                    .entry(parent.as_str().to_string())
                    .or_default()
                    .push(entry.path.clone());
            }
        }

        let scanned = AtomicU64::new(0);
        let changed = self
            .scan_dir(self.base_dir.clone(), &mtimes, &cached_children, &scanned)
            .await;

        let mut changes = Vec::new();
        for dir in &changed {
            changes.extend(self.diff_directory(dir).await?);
        }

        let result = DeltaDetectionResult {
            changed_dirs: changed.iter().map(|d| d.path.clone()).collect(),
            changes,
            need_full_scan: false,
            scanned_dirs: scanned.load(Ordering::Relaxed),
        };

        info!(
            scanned_dirs = result.scanned_dirs,
            changed_dirs = result.changed_dirs.len(),
            changes = result.changes.len(),
            "Delta detection complete"
        );

        Ok(result)
    }

    /// Walks one directory, pruning on matching mtime
    ///
    /// Siblings are fanned out in chunks of `concurrency`; descent between
    /// depth levels stays sequential so work is breadth-weighted but
    /// bounded.
    fn scan_dir<'a>(
        &'a self,
        dir: RemotePath,
        mtimes: &'a HashMap<String, i64>,
        cached_children: &'a HashMap<String, Vec<RemotePath>>,
        scanned: &'a AtomicU64,
    ) -> BoxFuture<'a, Vec<ChangedDir>> {
        Box::pin(async move {
            scanned.fetch_add(1, Ordering::Relaxed);

            let records = match self.remote.propfind(&dir, Depth::Zero).await {
                Ok(records) => records,
                Err(err) => {
                    warn!(
                        dir = %dir,
                        error = %err,
                        "Stat failed, conservatively treating directory as changed"
                    );
                    return vec![ChangedDir {
                        path: dir,
                        deleted: false,
                    }];
                }
            };

            let Some(current) = records.into_iter().next() else {
                debug!(dir = %dir, "Directory no longer present on remote");
                return vec![ChangedDir {
                    path: dir,
                    deleted: true,
                }];
            };

            if let Some(&cached_mtime) = mtimes.get(dir.as_str()) {
                if cached_mtime == current.mtime_ms {
                    // Unchanged children; the whole subtree is pruned.
                    return Vec::new();
                }
            }

            debug!(dir = %dir, mtime = current.mtime_ms, "Directory changed");
            let mut changed = vec![ChangedDir {
                path: dir.clone(),
                deleted: false,
            }];

            let listing = match self.remote.propfind(&dir, Depth::One).await {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(dir = %dir, error = %err, "Child enumeration failed");
                    return changed;
                }
            };

            let mut subdirs: BTreeSet<RemotePath> = BTreeSet::new();
            for stat in listing {
                if stat.is_dir && stat.path != dir.as_str() {
                    if let Ok(path) = RemotePath::new(stat.path) {
                        subdirs.insert(path);
                    }
                }
            }
            if let Some(known) = cached_children.get(dir.as_str()) {
                subdirs.extend(known.iter().cloned());
            }

            let subdirs: Vec<RemotePath> = subdirs.into_iter().collect();
            for chunk in subdirs.chunks(self.concurrency) {
                let results = join_all(
                    chunk
                        .iter()
                        .map(|d| self.scan_dir(d.clone(), mtimes, cached_children, scanned)),
                )
                .await;
                for result in results {
                    changed.extend(result);
                }
            }

            changed
        })
    }

    /// File-level diff of one changed directory's immediate children
    async fn diff_directory(&self, dir: &ChangedDir) -> Result<Vec<FileChange>> {
        let current_listing: Vec<StatModel> = if dir.deleted {
            Vec::new()
        } else {
            match self.remote.propfind(&dir.path, Depth::One).await {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(
                        dir = %dir.path,
                        error = %err,
                        "Listing failed during diff; skipping directory rather than \
                         reporting its children deleted"
                    );
                    return Ok(Vec::new());
                }
            }
        };

        let current: HashMap<String, StatModel> = current_listing
            .into_iter()
            .filter(|s| s.path != dir.path.as_str())
            .map(|s| (s.path.clone(), s))
            .collect();

        let mut cached = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .index
                .get_by_parent(&dir.path, offset, DIFF_PAGE_SIZE)
                .await
                .context("Failed to read cached children")?;
            let fetched = page.len();
            cached.extend(page);
            if fetched < DIFF_PAGE_SIZE as usize {
                break;
            }
            offset += fetched as u32;
        }
        let cached: HashMap<&str, &FileEntry> =
            cached.iter().map(|e| (e.path.as_str(), e)).collect();

        let mut changes = Vec::new();

        for (path, stat) in &current {
            match cached.get(path.as_str()) {
                None => {
                    let path = RemotePath::new(path.clone())
                        .context("Remote returned an invalid path")?;
                    changes.push(FileChange::added(path, stat.clone()));
                }
                Some(entry) => {
                    if is_modified(entry, stat) {
                        changes.push(FileChange::modified(entry.path.clone(), stat.clone()));
                    }
                }
            }
        }

        for (path, entry) in &cached {
            if !current.contains_key(*path) {
                changes.push(FileChange::deleted(entry.path.clone()));
            }
        }

        Ok(changes)
    }

    // ========================================================================
    // Applying changes
    // ========================================================================

    /// Applies detector output to the file index
    ///
    /// Deletions are batch-removed; additions and modifications are
    /// batch-upserted with `last_synced` stamped now.
    pub async fn update_file_index(&self, changes: &[FileChange]) -> Result<()> {
        let now = now_ms();
        let mut deleted = Vec::new();
        let mut upserts = Vec::new();

        for change in changes {
            match change.kind {
                ChangeKind::Deleted => deleted.push(change.path.clone()),
                ChangeKind::Added | ChangeKind::Modified => {
                    if let Some(stat) = &change.stat {
                        upserts.push(FileEntry::from_stat(stat, change.path.clone(), now));
                    }
                }
            }
        }

        if !deleted.is_empty() {
            self.index
                .batch_delete(&deleted)
                .await
                .context("Failed to delete removed entries")?;
        }
        if !upserts.is_empty() {
            self.index
                .batch_set(&upserts)
                .await
                .context("Failed to upsert changed entries")?;
        }

        info!(
            upserted = upserts.len(),
            deleted = deleted.len(),
            "File index updated"
        );
        Ok(())
    }

    /// Refreshes the directory mtime cache after changes were applied
    ///
    /// Re-stats the parent directory of every changed path and upserts its
    /// cache entry (`child_count` stays 0 here; it is a hint, not an
    /// invariant). Directories that vanished, including deleted directories
    /// themselves, are dropped from the cache.
    pub async fn update_dir_mtime_cache(&self, changes: &[FileChange]) -> Result<()> {
        let mut parents: BTreeSet<RemotePath> = BTreeSet::new();
        for change in changes {
            if let Some(parent) = change.path.parent() {
                parents.insert(parent);
            }
            if change.kind == ChangeKind::Deleted {
                self.index
                    .dir_delete(&change.path)
                    .await
                    .context("Failed to drop deleted directory from mtime cache")?;
            }
        }

        self.refresh_dir_mtimes_inner(parents).await
    }

    /// Re-stats the given directories and upserts their cache entries
    ///
    /// Used by the driver when a pass found changed directories whose
    /// file-level diff was empty (only subtree contents moved): without the
    /// refresh their stale cached mtime would force a re-walk every pass.
    pub async fn refresh_dir_mtimes(&self, dirs: &[RemotePath]) -> Result<()> {
        self.refresh_dir_mtimes_inner(dirs.iter().cloned().collect())
            .await
    }

    async fn refresh_dir_mtimes_inner(&self, dirs: BTreeSet<RemotePath>) -> Result<()> {
        let now = now_ms();
        let mut refreshed = Vec::new();
        for dir in dirs {
            match self.remote.propfind(&dir, Depth::Zero).await {
                Ok(records) => match records.into_iter().next() {
                    Some(stat) => refreshed.push(DirMtimeEntry {
                        path: dir,
                        mtime: stat.mtime_ms,
                        last_checked: now,
                        child_count: 0,
                    }),
                    None => {
                        self.index
                            .dir_delete(&dir)
                            .await
                            .context("Failed to drop vanished directory from mtime cache")?;
                    }
                },
                Err(err) => {
                    // Leave the stale entry; the directory will show as
                    // changed on the next pass.
                    warn!(dir = %dir, error = %err, "Could not refresh directory mtime");
                }
            }
        }

        if !refreshed.is_empty() {
            self.index
                .dir_set_many(&refreshed)
                .await
                .context("Failed to save refreshed directory mtimes")?;
        }

        debug!(refreshed = refreshed.len(), "Directory mtime cache updated");
        Ok(())
    }

    // ========================================================================
    // Full scan
    // ========================================================================

    /// Clears and rebuilds the whole index from the remote tree
    ///
    /// Destructive. Enumerates depth-first with bounded sibling fan-out,
    /// batching every directory's immediate children into the file index
    /// and recording the directory's own mtime. `on_progress` is invoked
    /// once per directory with `(entries_seen_so_far, current_path)`.
    ///
    /// Transport errors propagate; the progress record is retained so a
    /// later invocation can display where scanning stopped.
    pub async fn full_scan(
        &self,
        on_progress: impl Fn(u64, &RemotePath) + Send + Sync,
    ) -> Result<ScanTotals> {
        info!(base = %self.base_dir, "Starting full scan");

        self.index.clear().await.context("Failed to clear file index")?;
        self.index
            .dir_clear()
            .await
            .context("Failed to clear directory mtime cache")?;
        self.index
            .progress_clear()
            .await
            .context("Failed to clear previous progress record")?;

        let start = now_ms();
        let progress = SyncProgress::begin(SyncPhase::Scanning, start);
        let state = ScanState {
            session_id: progress.session_id.clone(),
            start_time_ms: start,
            entries_seen: AtomicU64::new(0),
            file_count: AtomicU64::new(0),
            dir_count: AtomicU64::new(0),
        };
        self.index
            .progress_set(&progress)
            .await
            .context("Failed to record scan progress")?;

        self.scan_tree(self.base_dir.clone(), &state, &on_progress)
            .await?;

        let totals = ScanTotals {
            file_count: state.file_count.load(Ordering::Relaxed),
            dir_count: state.dir_count.load(Ordering::Relaxed),
        };

        self.index
            .progress_clear()
            .await
            .context("Failed to clear progress record")?;

        info!(
            files = totals.file_count,
            dirs = totals.dir_count,
            "Full scan complete"
        );
        Ok(totals)
    }

    /// Recursive scan worker: one directory plus its subtree
    fn scan_tree<'a>(
        &'a self,
        dir: RemotePath,
        state: &'a ScanState,
        on_progress: &'a (dyn Fn(u64, &RemotePath) + Send + Sync),
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let listing = match self.remote.propfind(&dir, Depth::One).await {
                Ok(listing) => listing,
                Err(err) => {
                    // Retain a snapshot naming the failed directory before
                    // surfacing the error.
                    let mut snapshot = self.progress_snapshot(state, &dir);
                    snapshot.failed.push(dir.clone());
                    self.index.progress_set(&snapshot).await.ok();
                    return Err(err).with_context(|| format!("Scan failed at {dir}"));
                }
            };

            let now = now_ms();
            let mut records = listing.into_iter();
            let Some(self_stat) = records.next() else {
                // Vanished between listing its parent and visiting it.
                debug!(dir = %dir, "Directory disappeared mid-scan, skipping");
                return Ok(());
            };

            let mut entries = vec![FileEntry::from_stat(&self_stat, dir.clone(), now)];
            let mut subdirs = Vec::new();
            for stat in records {
                let Ok(path) = RemotePath::new(stat.path.clone()) else {
                    warn!(path = %stat.path, "Skipping child with invalid path");
                    continue;
                };
                if stat.is_dir {
                    subdirs.push(path);
                } else {
                    entries.push(FileEntry::from_stat(&stat, path, now));
                }
            }

            let child_count = (entries.len() - 1 + subdirs.len()) as u32;
            state.dir_count.fetch_add(1, Ordering::Relaxed);
            state
                .file_count
                .fetch_add((entries.len() - 1) as u64, Ordering::Relaxed);
            let seen = state
                .entries_seen
                .fetch_add(child_count as u64, Ordering::Relaxed)
                + child_count as u64;

            self.index
                .batch_set(&entries)
                .await
                .context("Failed to populate file index")?;
            self.index
                .dir_set(&DirMtimeEntry {
                    path: dir.clone(),
                    mtime: self_stat.mtime_ms,
                    last_checked: now,
                    child_count,
                })
                .await
                .context("Failed to record directory mtime")?;

            self.index
                .progress_set(&self.progress_snapshot(state, &dir))
                .await
                .ok();
            on_progress(seen, &dir);

            for chunk in subdirs.chunks(self.concurrency) {
                let results = join_all(
                    chunk
                        .iter()
                        .map(|d| self.scan_tree(d.clone(), state, on_progress)),
                )
                .await;
                for result in results {
                    result?;
                }
            }

            Ok(())
        })
    }

    fn progress_snapshot(&self, state: &ScanState, current: &RemotePath) -> SyncProgress {
        SyncProgress {
            session_id: state.session_id.clone(),
            start_time_ms: state.start_time_ms,
            phase: SyncPhase::Scanning,
            processed_count: state.entries_seen.load(Ordering::Relaxed),
            total_count: 0,
            current_path: Some(current.clone()),
            failed: Vec::new(),
        }
    }

    // ========================================================================
    // Stats
    // ========================================================================

    /// Current file and directory counts in the index
    pub async fn stats(&self) -> Result<ScanTotals> {
        let total = self.index.count().await?;
        let dir_count = self.index.all_dir_paths().await?.len() as u64;
        Ok(ScanTotals {
            file_count: total.saturating_sub(dir_count),
            dir_count,
        })
    }
}

/// Whether a cached entry differs from the current remote stat
///
/// Files compare `(mtime, size)`; an `is_dir` flip alone qualifies. A
/// directory's own mtime drift is deliberately ignored here: it moves on
/// child changes that the child-level comparisons already cover.
fn is_modified(entry: &FileEntry, stat: &StatModel) -> bool {
    if entry.is_dir != stat.is_dir {
        return true;
    }
    if stat.is_dir {
        return false;
    }
    entry.mtime != stat.mtime_ms || entry.size != stat.size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(is_dir: bool, mtime: i64, size: u64) -> FileEntry {
        let path = RemotePath::new("/base/x").unwrap();
        FileEntry {
            basename: "x".to_string(),
            is_dir,
            mtime,
            size,
            etag: None,
            content_hash: None,
            last_synced: 0,
            parent_path: path.parent().unwrap(),
            path,
        }
    }

    fn stat(is_dir: bool, mtime: i64, size: u64) -> StatModel {
        StatModel {
            path: "/base/x".to_string(),
            basename: "x".to_string(),
            is_dir,
            is_deleted: false,
            mtime_ms: mtime,
            size,
        }
    }

    #[test]
    fn test_is_modified_file_mtime() {
        assert!(is_modified(&entry(false, 100, 10), &stat(false, 200, 10)));
    }

    #[test]
    fn test_is_modified_file_size() {
        assert!(is_modified(&entry(false, 100, 10), &stat(false, 100, 20)));
    }

    #[test]
    fn test_is_modified_file_unchanged() {
        assert!(!is_modified(&entry(false, 100, 10), &stat(false, 100, 10)));
    }

    #[test]
    fn test_is_modified_dir_mtime_ignored() {
        assert!(!is_modified(&entry(true, 100, 0), &stat(true, 999, 0)));
    }

    #[test]
    fn test_is_modified_kind_flip() {
        assert!(is_modified(&entry(false, 100, 10), &stat(true, 100, 0)));
        assert!(is_modified(&entry(true, 100, 0), &stat(false, 100, 0)));
    }
}
