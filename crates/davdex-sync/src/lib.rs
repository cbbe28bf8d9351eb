//! Davdex Sync - Incremental remote tree synchronization
//!
//! Provides:
//! - Hierarchical delta detection with directory-mtime pruning
//! - Bounded-concurrency full scan with streaming index population
//! - The sync driver that turns detection output into a consistent listing
//!
//! ## How detection stays sub-linear
//!
//! A directory whose remote mtime still equals the cached value has had no
//! immediate child added, removed, or renamed, so the detector never
//! descends into it. Cost scales with the edit frontier (directories whose
//! children actually changed), not with the tree size.

pub mod detector;
pub mod driver;

pub use detector::DeltaDetector;
pub use driver::SyncDriver;
