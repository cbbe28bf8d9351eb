//! Davdex Cache - Persistent index store
//!
//! SQLite-based persistence for:
//! - File entries (path -> metadata)
//! - Directory mtime cache
//! - The per-namespace sync progress record
//!
//! ## Architecture
//!
//! This crate implements the `IFileIndex` port from `davdex-core` using
//! SQLite as the storage backend. It is a driven (secondary) adapter in the
//! hexagonal architecture. All three maps live in one database file; every
//! row carries a namespace key so independent trees coexist.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - connection pool with migration support
//! - [`SqliteFileIndex`] - full `IFileIndex` implementation
//! - [`CacheError`] - error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use davdex_cache::{DatabasePool, SqliteFileIndex};
//! use davdex_core::domain::{Namespace, RemotePath};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/davdex/index.db")).await?;
//! let ns = Namespace::new("notes", RemotePath::new("/notes")?)?;
//! let index = SqliteFileIndex::new(pool.pool().clone(), &ns);
//! // Use index as IFileIndex...
//! # Ok(())
//! # }
//! ```

pub mod index;
pub mod pool;

pub use index::SqliteFileIndex;
pub use pool::DatabasePool;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
