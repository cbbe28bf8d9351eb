//! Detector-level tests: failure posture, diff classification, progress
//!
//! These drive `DeltaDetector` directly (rather than through the driver)
//! to pin down the conservative error handling and the shape of the
//! emitted change set.

mod common;

use davdex_core::domain::{ChangeKind, RemotePath, SyncPhase};
use davdex_core::ports::remote_directory::Depth;
use davdex_core::ports::IFileIndex;

use common::setup;

/// A failed depth-0 stat marks the directory changed instead of failing
/// the pass
#[tokio::test]
async fn test_stat_failure_is_conservative() {
    let (remote, _index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_dir("/base/sub", 20);
    remote.add_file("/base/sub/x.txt", 30, 1);
    driver.walk().await.unwrap();

    // Force the walk down to /base/sub, then make its stat fail
    remote.touch_file("/base/sub/x.txt", 100, 2);
    remote.fail_on("/base/sub", Depth::Zero);
    remote.fail_on("/base/sub", Depth::One);

    let detection = driver.detector().detect_changes().await.unwrap();

    assert!(!detection.need_full_scan);
    assert!(detection
        .changed_dirs
        .iter()
        .any(|d| d.as_str() == "/base/sub"));
    // With its listing also unreachable, no changes may be emitted for it
    assert!(detection.changes.is_empty());
}

/// A failed depth-1 listing during the diff must not read as "directory
/// is now empty"
#[tokio::test]
async fn test_listing_failure_emits_no_deletions() {
    let (remote, _index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_file("/base/a.txt", 20, 1);
    remote.add_file("/base/b.txt", 21, 1);
    driver.walk().await.unwrap();

    remote.touch_file("/base/a.txt", 100, 2);
    remote.fail_on("/base", Depth::One);

    let detection = driver.detector().detect_changes().await.unwrap();

    assert!(detection
        .changed_dirs
        .iter()
        .any(|d| d.as_str() == "/base"));
    assert!(
        detection.changes.is_empty(),
        "an unreachable listing produced changes: {:?}",
        detection.changes
    );

    // Once the transport recovers, the same pass shape finds the change
    remote.clear_failures();
    let detection = driver.detector().detect_changes().await.unwrap();
    assert_eq!(detection.changes.len(), 1);
    assert_eq!(detection.changes[0].kind, ChangeKind::Modified);
}

/// A path flipping between file and directory is reported modified even
/// when mtime and size agree
#[tokio::test]
async fn test_kind_flip_is_modified() {
    let (remote, _index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_file("/base/thing", 20, 0);
    driver.walk().await.unwrap();

    // Same mtime, same (zero) size, different kind
    remote.remove_subtree("/base/thing", 20);
    remote.add_dir("/base/thing", 20);
    remote.set_mtime("/base/thing", 20);
    remote.set_mtime("/base", 99);

    let detection = driver.detector().detect_changes().await.unwrap();
    let change = detection
        .changes
        .iter()
        .find(|c| c.path.as_str() == "/base/thing")
        .expect("kind flip not detected");
    assert_eq!(change.kind, ChangeKind::Modified);
    assert!(change.stat.as_ref().unwrap().is_dir);
}

/// Detection on an empty cache demands a full scan without touching the
/// remote
#[tokio::test]
async fn test_empty_cache_needs_full_scan() {
    let (remote, _index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);

    let detection = driver.detector().detect_changes().await.unwrap();
    assert!(detection.need_full_scan);
    assert_eq!(remote.total_calls(), 0);
}

/// A cache that lost its base-directory record is treated as invalid
#[tokio::test]
async fn test_cache_without_base_record_is_invalid() {
    let (remote, index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_dir("/base/sub", 20);
    driver.walk().await.unwrap();

    index
        .dir_delete(&RemotePath::new("/base").unwrap())
        .await
        .unwrap();

    let detection = driver.detector().detect_changes().await.unwrap();
    assert!(detection.need_full_scan);
}

/// detect_changes is non-destructive: the index is identical before and
/// after a pass that found changes
#[tokio::test]
async fn test_detection_is_non_destructive() {
    let (remote, index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_file("/base/a.txt", 20, 1);
    driver.walk().await.unwrap();

    remote.touch_file("/base/a.txt", 100, 9);
    let before = index.count().await.unwrap();

    let detection = driver.detector().detect_changes().await.unwrap();
    assert_eq!(detection.changes.len(), 1);

    assert_eq!(index.count().await.unwrap(), before);
    let entry = index
        .get(&RemotePath::new("/base/a.txt").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.mtime, 20, "detection must not write entries");
}

/// The full-scan progress callback reports every directory, and the
/// record is cleared on success
#[tokio::test]
async fn test_full_scan_progress() {
    let (remote, index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_dir("/base/sub", 20);
    remote.add_file("/base/a.txt", 30, 1);
    remote.add_file("/base/sub/b.txt", 40, 1);

    let seen = std::sync::Mutex::new(Vec::new());
    let totals = driver
        .detector()
        .full_scan(|entries_seen, dir| {
            seen.lock().unwrap().push((entries_seen, dir.clone()));
        })
        .await
        .unwrap();

    assert_eq!(totals.file_count, 2);
    assert_eq!(totals.dir_count, 2);

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 2, "one callback per directory");
    assert!(seen.iter().any(|(_, d)| d.as_str() == "/base"));
    assert!(seen.iter().any(|(_, d)| d.as_str() == "/base/sub"));

    assert!(index.progress_get().await.unwrap().is_none());
}

/// A transport error during the full scan propagates and retains the
/// progress record
#[tokio::test]
async fn test_full_scan_error_retains_progress() {
    let (remote, index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_dir("/base/sub", 20);
    remote.add_file("/base/sub/x.txt", 30, 1);
    remote.fail_on("/base/sub", Depth::One);

    let result = driver.detector().full_scan(|_, _| {}).await;
    assert!(result.is_err());

    let progress = index.progress_get().await.unwrap().expect("record retained");
    assert_eq!(progress.phase, SyncPhase::Scanning);
    assert!(progress
        .failed
        .iter()
        .any(|p| p.as_str() == "/base/sub"));
}

/// stats reflects the live index
#[tokio::test]
async fn test_stats() {
    let (remote, _index, driver) = setup("/base").await;
    remote.add_dir("/base", 10);
    remote.add_dir("/base/sub", 20);
    remote.add_file("/base/a.txt", 30, 1);
    remote.add_file("/base/sub/b.txt", 40, 1);
    driver.walk().await.unwrap();

    let totals = driver.detector().stats().await.unwrap();
    assert_eq!(totals.file_count, 2);
    assert_eq!(totals.dir_count, 2);
}
