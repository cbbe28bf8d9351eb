//! Davdex WebDAV - Remote directory adapter
//!
//! Implements the `IRemoteDirectory` port from `davdex-core` over WebDAV
//! PROPFIND. It is a driven (secondary) adapter in the hexagonal
//! architecture.
//!
//! ## Key Components
//!
//! - [`WebdavClient`] - reqwest-based client issuing depth-0/1 PROPFINDs
//! - [`xml`] - multistatus response parsing (quick-xml)
//! - [`RequestLimiter`] - token-bucket pacing of outbound requests
//! - [`WebdavError`] - error types for transport operations
//!
//! ## Retry semantics
//!
//! Service-unavailable responses (502/503/504) are retried internally with
//! a fixed delay, without bound for that error class. Target-not-found
//! (404/410) maps to an empty result, which callers read as deletion of the
//! target. Every other failure surfaces to the caller.

pub mod client;
pub mod limiter;
pub mod xml;

pub use client::{WebdavClient, WebdavConfig};
pub use limiter::RequestLimiter;

/// Errors that can occur during WebDAV operations
#[derive(Debug, thiserror::Error)]
pub enum WebdavError {
    /// The server returned a non-success, non-retryable status
    #[error("HTTP {status} for {path}")]
    HttpStatus {
        status: reqwest::StatusCode,
        path: String,
    },

    /// Transport-level failure (connect, TLS, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed multistatus body
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Invalid server URL or href
    #[error("URL error: {0}")]
    Url(String),
}
