//! Sync driver
//!
//! [`SyncDriver::walk`] is the single main entry: it chooses between the
//! full-scan and incremental paths, applies detected changes, and returns
//! the filtered listing read back from the index.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use davdex_core::domain::{IndexStats, RemotePath, ScanTotals, SyncPhase, SyncProgress};
use davdex_core::encoding::complete_loss_dir;
use davdex_core::ports::remote_directory::StatModel;
use davdex_core::ports::{Filter, IFileIndex, IRemoteDirectory};

use crate::detector::{now_ms, DeltaDetector};

/// Drives one namespace's synchronization
///
/// At most one `walk()` should be active per namespace; behavior under
/// concurrent invocations is undefined and callers serialize externally.
pub struct SyncDriver {
    detector: DeltaDetector,
    index: Arc<dyn IFileIndex>,
    base_dir: RemotePath,
    filter: Arc<dyn Filter>,
}

impl SyncDriver {
    /// Creates a driver over the given adapters
    ///
    /// # Arguments
    /// * `remote` - remote directory capability (WebDAV adapter)
    /// * `index` - persistent index store for this namespace
    /// * `base_dir` - absolute remote directory to synchronize
    /// * `concurrency` - bounded fan-out for sibling directory scans
    /// * `filter` - include/exclude decision supplied by the embedding
    pub fn new(
        remote: Arc<dyn IRemoteDirectory>,
        index: Arc<dyn IFileIndex>,
        base_dir: RemotePath,
        concurrency: usize,
        filter: Arc<dyn Filter>,
    ) -> Self {
        let detector = DeltaDetector::new(remote, Arc::clone(&index), base_dir.clone(), concurrency);
        Self {
            detector,
            index,
            base_dir,
            filter,
        }
    }

    /// The detector backing this driver
    pub fn detector(&self) -> &DeltaDetector {
        &self.detector
    }

    /// Synchronizes the index with the remote and returns the listing
    ///
    /// 1. An empty index triggers a full scan.
    /// 2. Otherwise changes are detected incrementally; detection may still
    ///    demand a full scan when the mtime cache cannot be trusted.
    /// 3. Detected changes are applied to the file index, then the
    ///    directory mtime cache is refreshed.
    /// 4. The listing is read back from the index: entries under the base
    ///    directory, relative paths, filter applied, and ancestor
    ///    directories implied by included files re-added. Paths were
    ///    already percent- and entity-decoded at ingestion.
    ///
    /// A quiet pass (no changes) performs no store writes beyond the
    /// detection reads themselves.
    #[tracing::instrument(skip(self))]
    pub async fn walk(&self) -> Result<Vec<StatModel>> {
        if let Some(progress) = self.index.progress_get().await? {
            if progress.phase != SyncPhase::Syncing {
                // Informational only; the pass restarts from the root and
                // exits early for unchanged subtrees.
                info!(
                    session = %progress.session_id,
                    phase = progress.phase.as_str(),
                    processed = progress.processed_count,
                    "Found progress record from an interrupted pass"
                );
            }
        }

        if self.index.count().await? == 0 {
            info!("Index is empty, performing initial full scan");
            self.detector.full_scan(log_scan_progress).await?;
            return self.listing().await;
        }

        let detection = self.detector.detect_changes().await?;

        if detection.need_full_scan {
            info!("Cache cannot support incremental detection, rescanning");
            self.detector.full_scan(log_scan_progress).await?;
            return self.listing().await;
        }

        if detection.changes.is_empty() {
            debug!(
                scanned_dirs = detection.scanned_dirs,
                "No remote changes detected"
            );
            if !detection.changed_dirs.is_empty() {
                // Directories can change without any file-level diff (only
                // subtree contents moved). Refresh them so the next pass
                // prunes instead of re-walking.
                self.detector
                    .refresh_dir_mtimes(&detection.changed_dirs)
                    .await?;
            }
            return self.listing().await;
        }

        info!(
            changes = detection.changes.len(),
            changed_dirs = detection.changed_dirs.len(),
            "Applying detected changes"
        );

        let mut progress = SyncProgress::begin(SyncPhase::Syncing, now_ms());
        progress.total_count = detection.changes.len() as u64;
        self.index
            .progress_set(&progress)
            .await
            .context("Failed to record sync progress")?;

        self.detector.update_file_index(&detection.changes).await?;

        progress.phase = SyncPhase::Updating;
        progress.processed_count = detection.changes.len() as u64;
        self.index
            .progress_set(&progress)
            .await
            .context("Failed to record update progress")?;

        self.detector
            .update_dir_mtime_cache(&detection.changes)
            .await?;

        self.index
            .progress_clear()
            .await
            .context("Failed to clear progress record")?;

        self.listing().await
    }

    /// Removes every persisted record for this namespace
    pub async fn clear_index(&self) -> Result<()> {
        self.index.clear().await?;
        self.index.dir_clear().await?;
        self.index.progress_clear().await?;
        info!("Index cleared");
        Ok(())
    }

    /// Clears the index and rebuilds it with a full scan
    pub async fn rebuild_index(&self) -> Result<ScanTotals> {
        self.clear_index().await?;
        self.detector.full_scan(log_scan_progress).await
    }

    /// Reports current index statistics
    pub async fn get_index_stats(&self) -> Result<IndexStats> {
        let totals = self.detector.stats().await?;
        Ok(IndexStats {
            file_count: totals.file_count,
            dir_count: totals.dir_count,
            has_index: totals.file_count + totals.dir_count > 0,
        })
    }

    /// Reads the filtered listing back from the index
    async fn listing(&self) -> Result<Vec<StatModel>> {
        let mut out = Vec::new();

        self.index
            .for_each(&mut |entry| {
                if !entry.path.is_under(&self.base_dir) {
                    return true;
                }
                let Some(relative) = entry.path.relative_to(&self.base_dir) else {
                    return true;
                };
                // The base directory itself is not part of its own listing
                if relative.is_empty() {
                    return true;
                }

                // Stored paths are already fully decoded; decoding again
                // here would corrupt names containing entity-like literals.
                let relative = relative.to_string();
                if !self.filter.include(&relative) {
                    return true;
                }

                let basename = relative
                    .rsplit('/')
                    .next()
                    .unwrap_or(relative.as_str())
                    .to_string();
                out.push(StatModel {
                    path: relative,
                    basename,
                    is_dir: entry.is_dir,
                    is_deleted: false,
                    mtime_ms: entry.mtime,
                    size: entry.size,
                });
                true
            })
            .await
            .context("Failed to stream index entries")?;

        let mut listing = complete_loss_dir(out);
        listing.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listing)
    }
}

/// Progress callback used for driver-initiated full scans
fn log_scan_progress(entries_seen: u64, current: &RemotePath) {
    debug!(entries_seen, dir = %current, "Scan progress");
}
