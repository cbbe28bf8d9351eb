//! Ports (driven/secondary interfaces)
//!
//! Adapters implement these traits: the WebDAV transport implements
//! [`IRemoteDirectory`], the SQLite store implements [`IFileIndex`], and
//! the embedding supplies a [`Filter`].

pub mod file_index;
pub mod filter;
pub mod remote_directory;

pub use file_index::IFileIndex;
pub use filter::{AcceptAll, Filter};
pub use remote_directory::{Depth, IRemoteDirectory, StatModel};
