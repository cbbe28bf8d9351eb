//! Persistent index store port (driven/secondary port)
//!
//! Three logically distinct maps behind one trait: the file index (path ->
//! [`FileEntry`]), the directory mtime cache (path -> [`DirMtimeEntry`]),
//! and a single advisory [`SyncProgress`] record per namespace.
//!
//! ## Contract
//!
//! - Each individual `set`/`delete` is durable before it returns. There are
//!   no cross-key transactions; a batch interrupted by a crash leaves
//!   partial progress that a later full scan repairs.
//! - `get_by_prefix` and `get_modified_after` are streaming scans: O(N) in
//!   the number of entries. Callers use them sparingly.
//! - `get_by_parent` is the hot path of file-level diffing and is expected
//!   to be backed by a secondary index on the parent path.

use crate::domain::entry::{DirMtimeEntry, FileEntry};
use crate::domain::paths::RemotePath;
use crate::domain::progress::SyncProgress;

/// Suggested chunk size for batched writes
pub const BATCH_CHUNK_SIZE: usize = 1000;

/// Port trait for the persistent file index
#[async_trait::async_trait]
pub trait IFileIndex: Send + Sync {
    // --- File entries ---

    /// Point lookup by path
    async fn get(&self, path: &RemotePath) -> anyhow::Result<Option<FileEntry>>;

    /// Inserts or replaces a single entry
    async fn set(&self, entry: &FileEntry) -> anyhow::Result<()>;

    /// Removes a single entry; removing a missing path is not an error
    async fn delete(&self, path: &RemotePath) -> anyhow::Result<()>;

    /// Inserts or replaces entries in chunks of [`BATCH_CHUNK_SIZE`]
    async fn batch_set(&self, entries: &[FileEntry]) -> anyhow::Result<()>;

    /// Removes entries in chunks of [`BATCH_CHUNK_SIZE`]
    async fn batch_delete(&self, paths: &[RemotePath]) -> anyhow::Result<()>;

    /// Paged listing of the direct children of `parent`
    async fn get_by_parent(
        &self,
        parent: &RemotePath,
        offset: u32,
        limit: u32,
    ) -> anyhow::Result<Vec<FileEntry>>;

    /// All entries whose path equals `prefix` or starts with `prefix + "/"`
    async fn get_by_prefix(&self, prefix: &RemotePath) -> anyhow::Result<Vec<FileEntry>>;

    /// All entries with `mtime > ts_ms`
    async fn get_modified_after(&self, ts_ms: i64) -> anyhow::Result<Vec<FileEntry>>;

    /// Streaming visitor over all entries; the callback returns `false`
    /// to stop early
    async fn for_each(
        &self,
        visit: &mut (dyn FnMut(FileEntry) -> bool + Send),
    ) -> anyhow::Result<()>;

    /// Total number of entries
    async fn count(&self) -> anyhow::Result<u64>;

    /// Paths of all directory entries
    async fn all_dir_paths(&self) -> anyhow::Result<Vec<RemotePath>>;

    /// All entry paths
    async fn all_paths(&self) -> anyhow::Result<Vec<RemotePath>>;

    /// Removes every file entry in this namespace
    async fn clear(&self) -> anyhow::Result<()>;

    // --- Directory mtime cache ---

    async fn dir_get(&self, path: &RemotePath) -> anyhow::Result<Option<DirMtimeEntry>>;

    async fn dir_set(&self, entry: &DirMtimeEntry) -> anyhow::Result<()>;

    /// Upserts many cache entries at once
    async fn dir_set_many(&self, entries: &[DirMtimeEntry]) -> anyhow::Result<()>;

    async fn dir_delete(&self, path: &RemotePath) -> anyhow::Result<()>;

    /// Loads the full cache; sized by the number of known directories and
    /// assumed to fit in memory
    async fn dir_all(&self) -> anyhow::Result<Vec<DirMtimeEntry>>;

    async fn dir_count(&self) -> anyhow::Result<u64>;

    async fn dir_clear(&self) -> anyhow::Result<()>;

    // --- Sync progress ---

    async fn progress_get(&self) -> anyhow::Result<Option<SyncProgress>>;

    async fn progress_set(&self, progress: &SyncProgress) -> anyhow::Result<()>;

    async fn progress_clear(&self) -> anyhow::Result<()>;
}
