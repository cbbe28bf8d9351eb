//! Remote directory port (driven/secondary port)
//!
//! A deliberately narrow capability over the WebDAV transport: metadata
//! stat of one resource (depth 0) or of a resource plus its immediate
//! children (depth 1). Nothing else of the transport is consumed.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//! - `StatModel` is a port-level DTO, not a domain entity; its `path` is a
//!   plain string because the same shape is reused for the relative-path
//!   listings handed back to callers.

use serde::{Deserialize, Serialize};

use crate::domain::paths::RemotePath;

/// PROPFIND depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The resource itself
    Zero,
    /// The resource and its immediate children
    One,
}

impl Depth {
    /// Value for the `Depth` request header
    #[must_use]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
        }
    }
}

/// Metadata record exchanged with the remote adapter and with callers
///
/// `is_deleted` is only meaningful in change streams; listings always carry
/// `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModel {
    /// Normalized path: absolute in adapter responses, relative (to the
    /// base directory) in the listings returned to callers
    pub path: String,
    /// Final path segment
    pub basename: String,
    pub is_dir: bool,
    pub is_deleted: bool,
    /// Last modification, integer milliseconds since epoch; 0 if unknown
    pub mtime_ms: i64,
    /// Size in bytes; 0 for directories
    pub size: u64,
}

/// Port trait for remote metadata queries
///
/// ## Implementation Notes
///
/// - Returned paths are normalized to the domain convention (leading `/`,
///   no trailing `/`).
/// - With [`Depth::One`] the directory itself is the first element;
///   callers filter it out.
/// - Target-not-found yields `Ok(vec![])` -- the detector reads that as a
///   deletion of the target.
/// - Transient service-unavailable responses are retried internally with a
///   fixed delay, without bound for that error class. Other errors surface
///   to the caller.
#[async_trait::async_trait]
pub trait IRemoteDirectory: Send + Sync {
    /// Stats `path`, or lists it with its immediate children
    async fn propfind(&self, path: &RemotePath, depth: Depth) -> anyhow::Result<Vec<StatModel>>;
}
