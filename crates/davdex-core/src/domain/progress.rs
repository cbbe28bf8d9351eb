//! Sync progress record
//!
//! At most one progress record exists per namespace. It is advisory: the
//! driver logs its presence after an interrupted run but does not resume
//! from it; the next invocation restarts from the root and exits early for
//! unchanged subtrees. The `failed` list is kept for diagnostics.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::paths::RemotePath;

/// Phase of an in-flight sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Scanning,
    Comparing,
    Syncing,
    Updating,
}

impl SyncPhase {
    /// Stable string form used in the persistent store
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Scanning => "scanning",
            SyncPhase::Comparing => "comparing",
            SyncPhase::Syncing => "syncing",
            SyncPhase::Updating => "updating",
        }
    }

    /// Parses the stored string form
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "scanning" => Ok(SyncPhase::Scanning),
            "comparing" => Ok(SyncPhase::Comparing),
            "syncing" => Ok(SyncPhase::Syncing),
            "updating" => Ok(SyncPhase::Updating),
            other => Err(DomainError::UnknownPhase(other.to_string())),
        }
    }
}

/// Progress of the sync pass currently (or last) in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub session_id: String,
    pub start_time_ms: i64,
    pub phase: SyncPhase,
    pub processed_count: u64,
    /// May be 0 when the total is unknown
    pub total_count: u64,
    pub current_path: Option<RemotePath>,
    /// Paths that failed during the pass
    pub failed: Vec<RemotePath>,
}

impl SyncProgress {
    /// Starts a fresh progress record in the given phase
    #[must_use]
    pub fn begin(phase: SyncPhase, start_time_ms: i64) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            start_time_ms,
            phase,
            processed_count: 0,
            total_count: 0,
            current_path: None,
            failed: Vec::new(),
        }
    }
}
