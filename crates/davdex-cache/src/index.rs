//! SQLite implementation of IFileIndex
//!
//! This module provides the concrete SQLite-based implementation of the
//! index store port defined in davdex-core. It handles row mapping and SQL
//! query construction for all three maps.
//!
//! ## Type Mapping
//!
//! | Domain Type     | SQL Type | Strategy                                  |
//! |-----------------|----------|-------------------------------------------|
//! | RemotePath      | TEXT     | String via `.as_str()` / `RemotePath::new()` |
//! | mtime / times   | INTEGER  | i64 milliseconds since epoch              |
//! | size            | INTEGER  | u64 <-> i64 cast                          |
//! | SyncPhase       | TEXT     | `as_str()` / `parse()`                    |
//! | failed paths    | TEXT     | serde_json array                          |
//!
//! Durability is per individual row write; batched writes are chunked and
//! a crash mid-batch leaves partial progress that a full scan repairs.

use futures::TryStreamExt;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use davdex_core::domain::{DirMtimeEntry, FileEntry, Namespace, RemotePath, SyncPhase, SyncProgress};
use davdex_core::ports::file_index::{IFileIndex, BATCH_CHUNK_SIZE};

use crate::CacheError;

/// SQLite-based implementation of the index store port
///
/// One instance serves one namespace; all queries are scoped by the
/// namespace key. Safe for interleaved reads and writes at the
/// single-record level through the shared connection pool.
pub struct SqliteFileIndex {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteFileIndex {
    /// Creates a new index over the given pool, scoped to `namespace`
    pub fn new(pool: SqlitePool, namespace: &Namespace) -> Self {
        Self {
            pool,
            namespace: namespace.key(),
        }
    }
}

// ============================================================================
// Row mapping helpers
// ============================================================================

fn path_from_str(s: &str) -> Result<RemotePath, CacheError> {
    RemotePath::new(s).map_err(|e| CacheError::SerializationError(format!("stored path: {e}")))
}

/// Reconstruct a FileEntry from a database row
fn entry_from_row(row: &SqliteRow) -> Result<FileEntry, CacheError> {
    let path: String = row.get("path");
    let parent_path: String = row.get("parent_path");
    let size: i64 = row.get("size");

    Ok(FileEntry {
        path: path_from_str(&path)?,
        basename: row.get("basename"),
        is_dir: row.get::<i64, _>("is_dir") != 0,
        mtime: row.get("mtime"),
        size: size.max(0) as u64,
        etag: row.get("etag"),
        content_hash: row.get("content_hash"),
        last_synced: row.get("last_synced"),
        parent_path: path_from_str(&parent_path)?,
    })
}

/// Reconstruct a DirMtimeEntry from a database row
fn dir_entry_from_row(row: &SqliteRow) -> Result<DirMtimeEntry, CacheError> {
    let path: String = row.get("path");
    let child_count: i64 = row.get("child_count");

    Ok(DirMtimeEntry {
        path: path_from_str(&path)?,
        mtime: row.get("mtime"),
        last_checked: row.get("last_checked"),
        child_count: child_count.max(0) as u32,
    })
}

/// Reconstruct the SyncProgress record from a database row
fn progress_from_row(row: &SqliteRow) -> Result<SyncProgress, CacheError> {
    let phase_str: String = row.get("phase");
    let phase = SyncPhase::parse(&phase_str)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;

    let current_path: Option<String> = row.get("current_path");
    let current_path = current_path.as_deref().map(path_from_str).transpose()?;

    let failed_json: String = row.get("failed");
    let failed: Vec<RemotePath> = serde_json::from_str(&failed_json)
        .map_err(|e| CacheError::SerializationError(format!("failed list: {e}")))?;

    let processed: i64 = row.get("processed_count");
    let total: i64 = row.get("total_count");

    Ok(SyncProgress {
        session_id: row.get("session_id"),
        start_time_ms: row.get("start_time_ms"),
        phase,
        processed_count: processed.max(0) as u64,
        total_count: total.max(0) as u64,
        current_path,
        failed,
    })
}

/// Escape `%`, `_`, and the escape character itself for a LIKE pattern
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// IFileIndex implementation
// ============================================================================

#[async_trait::async_trait]
impl IFileIndex for SqliteFileIndex {
    // --- File entries ---

    async fn get(&self, path: &RemotePath) -> anyhow::Result<Option<FileEntry>> {
        let row = sqlx::query("SELECT * FROM file_index WHERE namespace = ? AND path = ?")
            .bind(&self.namespace)
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, entry: &FileEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO file_index \
             (namespace, path, basename, is_dir, mtime, size, etag, content_hash, \
              last_synced, parent_path) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.namespace)
        .bind(entry.path.as_str())
        .bind(&entry.basename)
        .bind(entry.is_dir as i64)
        .bind(entry.mtime)
        .bind(entry.size as i64)
        .bind(&entry.etag)
        .bind(&entry.content_hash)
        .bind(entry.last_synced)
        .bind(entry.parent_path.as_str())
        .execute(&self.pool)
        .await?;

        tracing::trace!(path = %entry.path, "Saved file entry");
        Ok(())
    }

    async fn delete(&self, path: &RemotePath) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM file_index WHERE namespace = ? AND path = ?")
            .bind(&self.namespace)
            .bind(path.as_str())
            .execute(&self.pool)
            .await?;

        tracing::trace!(path = %path, "Deleted file entry");
        Ok(())
    }

    async fn batch_set(&self, entries: &[FileEntry]) -> anyhow::Result<()> {
        for chunk in entries.chunks(BATCH_CHUNK_SIZE) {
            let mut tx = self.pool.begin().await?;
            for entry in chunk {
                sqlx::query(
                    "INSERT OR REPLACE INTO file_index \
                     (namespace, path, basename, is_dir, mtime, size, etag, content_hash, \
                      last_synced, parent_path) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&self.namespace)
                .bind(entry.path.as_str())
                .bind(&entry.basename)
                .bind(entry.is_dir as i64)
                .bind(entry.mtime)
                .bind(entry.size as i64)
                .bind(&entry.etag)
                .bind(&entry.content_hash)
                .bind(entry.last_synced)
                .bind(entry.parent_path.as_str())
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
        }

        tracing::debug!(count = entries.len(), "Batch-saved file entries");
        Ok(())
    }

    async fn batch_delete(&self, paths: &[RemotePath]) -> anyhow::Result<()> {
        for chunk in paths.chunks(BATCH_CHUNK_SIZE) {
            let mut tx = self.pool.begin().await?;
            for path in chunk {
                sqlx::query("DELETE FROM file_index WHERE namespace = ? AND path = ?")
                    .bind(&self.namespace)
                    .bind(path.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
        }

        tracing::debug!(count = paths.len(), "Batch-deleted file entries");
        Ok(())
    }

    async fn get_by_parent(
        &self,
        parent: &RemotePath,
        offset: u32,
        limit: u32,
    ) -> anyhow::Result<Vec<FileEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM file_index WHERE namespace = ? AND parent_path = ? \
             ORDER BY path LIMIT ? OFFSET ?",
        )
        .bind(&self.namespace)
        .bind(parent.as_str())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(entry_from_row(row)?);
        }
        Ok(entries)
    }

    async fn get_by_prefix(&self, prefix: &RemotePath) -> anyhow::Result<Vec<FileEntry>> {
        // `/a` matches `/a` and `/a/...`, never the sibling `/ab`.
        let pattern = format!("{}/%", escape_like(prefix.as_str()));
        let rows = sqlx::query(
            "SELECT * FROM file_index WHERE namespace = ? \
             AND (path = ? OR path LIKE ? ESCAPE '\\') ORDER BY path",
        )
        .bind(&self.namespace)
        .bind(prefix.as_str())
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(entry_from_row(row)?);
        }
        Ok(entries)
    }

    async fn get_modified_after(&self, ts_ms: i64) -> anyhow::Result<Vec<FileEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM file_index WHERE namespace = ? AND mtime > ? ORDER BY path",
        )
        .bind(&self.namespace)
        .bind(ts_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(entry_from_row(row)?);
        }
        Ok(entries)
    }

    async fn for_each(
        &self,
        visit: &mut (dyn FnMut(FileEntry) -> bool + Send),
    ) -> anyhow::Result<()> {
        let mut rows = sqlx::query("SELECT * FROM file_index WHERE namespace = ? ORDER BY path")
            .bind(&self.namespace)
            .fetch(&self.pool);

        while let Some(row) = rows.try_next().await? {
            let entry = entry_from_row(&row)?;
            if !visit(entry) {
                break;
            }
        }
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM file_index WHERE namespace = ?")
                .bind(&self.namespace)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn all_dir_paths(&self) -> anyhow::Result<Vec<RemotePath>> {
        let paths: Vec<String> = sqlx::query_scalar(
            "SELECT path FROM file_index WHERE namespace = ? AND is_dir = 1 ORDER BY path",
        )
        .bind(&self.namespace)
        .fetch_all(&self.pool)
        .await?;

        paths
            .iter()
            .map(|p| path_from_str(p).map_err(Into::into))
            .collect()
    }

    async fn all_paths(&self) -> anyhow::Result<Vec<RemotePath>> {
        let paths: Vec<String> =
            sqlx::query_scalar("SELECT path FROM file_index WHERE namespace = ? ORDER BY path")
                .bind(&self.namespace)
                .fetch_all(&self.pool)
                .await?;

        paths
            .iter()
            .map(|p| path_from_str(p).map_err(Into::into))
            .collect()
    }

    async fn clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM file_index WHERE namespace = ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Cleared file index");
        Ok(())
    }

    // --- Directory mtime cache ---

    async fn dir_get(&self, path: &RemotePath) -> anyhow::Result<Option<DirMtimeEntry>> {
        let row = sqlx::query("SELECT * FROM dir_mtime WHERE namespace = ? AND path = ?")
            .bind(&self.namespace)
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(dir_entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn dir_set(&self, entry: &DirMtimeEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO dir_mtime \
             (namespace, path, mtime, last_checked, child_count) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&self.namespace)
        .bind(entry.path.as_str())
        .bind(entry.mtime)
        .bind(entry.last_checked)
        .bind(entry.child_count as i64)
        .execute(&self.pool)
        .await?;

        tracing::trace!(path = %entry.path, mtime = entry.mtime, "Saved dir mtime");
        Ok(())
    }

    async fn dir_set_many(&self, entries: &[DirMtimeEntry]) -> anyhow::Result<()> {
        for chunk in entries.chunks(BATCH_CHUNK_SIZE) {
            let mut tx = self.pool.begin().await?;
            for entry in chunk {
                sqlx::query(
                    "INSERT OR REPLACE INTO dir_mtime \
                     (namespace, path, mtime, last_checked, child_count) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&self.namespace)
                .bind(entry.path.as_str())
                .bind(entry.mtime)
                .bind(entry.last_checked)
                .bind(entry.child_count as i64)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
        }
        Ok(())
    }

    async fn dir_delete(&self, path: &RemotePath) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM dir_mtime WHERE namespace = ? AND path = ?")
            .bind(&self.namespace)
            .bind(path.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dir_all(&self) -> anyhow::Result<Vec<DirMtimeEntry>> {
        let rows = sqlx::query("SELECT * FROM dir_mtime WHERE namespace = ? ORDER BY path")
            .bind(&self.namespace)
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(dir_entry_from_row(row)?);
        }
        Ok(entries)
    }

    async fn dir_count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dir_mtime WHERE namespace = ?")
            .bind(&self.namespace)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn dir_clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM dir_mtime WHERE namespace = ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Cleared dir mtime cache");
        Ok(())
    }

    // --- Sync progress ---

    async fn progress_get(&self) -> anyhow::Result<Option<SyncProgress>> {
        let row = sqlx::query("SELECT * FROM sync_progress WHERE namespace = ?")
            .bind(&self.namespace)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(progress_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn progress_set(&self, progress: &SyncProgress) -> anyhow::Result<()> {
        let failed = serde_json::to_string(&progress.failed)
            .map_err(|e| CacheError::SerializationError(format!("failed list: {e}")))?;

        sqlx::query(
            "INSERT OR REPLACE INTO sync_progress \
             (namespace, session_id, start_time_ms, phase, processed_count, total_count, \
              current_path, failed) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.namespace)
        .bind(&progress.session_id)
        .bind(progress.start_time_ms)
        .bind(progress.phase.as_str())
        .bind(progress.processed_count as i64)
        .bind(progress.total_count as i64)
        .bind(progress.current_path.as_ref().map(|p| p.as_str().to_string()))
        .bind(&failed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn progress_clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sync_progress WHERE namespace = ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
