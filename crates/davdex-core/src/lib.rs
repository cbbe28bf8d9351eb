//! Davdex Core - Domain model and ports
//!
//! Domain types, port traits, and configuration for davdex, an incremental
//! indexer for remote file trees exposed over WebDAV.
//!
//! ## Architecture
//!
//! This crate is the hexagon center: it defines the entities persisted by
//! the index store, the DTOs exchanged with the remote directory adapter,
//! and the port traits both adapters implement. It performs no I/O itself.
//!
//! ## Key Components
//!
//! - [`domain`] - entities ([`domain::FileEntry`], [`domain::DirMtimeEntry`],
//!   [`domain::SyncProgress`]), change records, and validated newtypes
//! - [`ports`] - [`ports::IRemoteDirectory`], [`ports::IFileIndex`], and
//!   [`ports::Filter`]
//! - [`config`] - YAML configuration with defaults
//! - [`encoding`] - href/path mapping and HTML-entity decoding

pub mod config;
pub mod domain;
pub mod encoding;
pub mod ports;

pub use config::Config;
