//! Validated path and namespace newtypes
//!
//! [`RemotePath`] is the canonical form every component agrees on: absolute,
//! `/`-separated, no trailing slash except for the root itself. All index
//! keys and adapter arguments use this type so normalization happens exactly
//! once, at the boundary.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RemotePath
// ============================================================================

/// An absolute path in the remote tree, normalized at construction
///
/// Invariants: starts with `/`, contains no empty or `.`/`..` segments,
/// and carries no trailing slash (the root `/` is the single exception).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a `RemotePath` from a string, normalizing trailing slashes
    ///
    /// Accepts `"/foo/bar"` and `"/foo/bar/"` (both yield `"/foo/bar"`).
    /// Rejects relative paths, empty segments, and dot segments.
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let raw: String = path.into();

        if !raw.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "not absolute: {raw}"
            )));
        }

        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self("/".to_string()));
        }

        for segment in trimmed[1..].split('/') {
            if segment.is_empty() {
                return Err(DomainError::InvalidPath(format!(
                    "empty segment in: {raw}"
                )));
            }
            if segment == "." || segment == ".." {
                return Err(DomainError::InvalidPath(format!(
                    "dot segment in: {raw}"
                )));
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The root path `/`
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns the path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The final path segment, or `None` for the root
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// The containing directory, or `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Appends a single segment to this path
    pub fn join(&self, segment: &str) -> Result<Self, DomainError> {
        if self.is_root() {
            Self::new(format!("/{segment}"))
        } else {
            Self::new(format!("{}/{segment}", self.0))
        }
    }

    /// Returns true if `self` equals `base` or lies beneath it
    #[must_use]
    pub fn is_under(&self, base: &RemotePath) -> bool {
        if base.is_root() {
            return true;
        }
        self.0 == base.0 || self.0.starts_with(&format!("{}/", base.0))
    }

    /// The path relative to `base`, without a leading slash
    ///
    /// Returns `Some("")` when `self == base` and `None` when `self` is not
    /// under `base`.
    #[must_use]
    pub fn relative_to(&self, base: &RemotePath) -> Option<&str> {
        if !self.is_under(base) {
            return None;
        }
        if self.0 == base.0 {
            return Some("");
        }
        if base.is_root() {
            Some(&self.0[1..])
        } else {
            Some(&self.0[base.0.len() + 1..])
        }
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Namespace
// ============================================================================

/// Identifies one independent index: a `(vault, remote base dir)` pair
///
/// Multiple trees coexist in one database; every persisted row is scoped
/// by the namespace key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    vault: String,
    base_dir: RemotePath,
}

impl Namespace {
    /// Creates a namespace from a vault name and remote base directory
    pub fn new(vault: impl Into<String>, base_dir: RemotePath) -> Result<Self, DomainError> {
        let vault = vault.into();
        if vault.is_empty() {
            return Err(DomainError::InvalidNamespace(
                "vault name must not be empty".to_string(),
            ));
        }
        Ok(Self { vault, base_dir })
    }

    /// The vault name component
    #[must_use]
    pub fn vault(&self) -> &str {
        &self.vault
    }

    /// The remote base directory component
    #[must_use]
    pub fn base_dir(&self) -> &RemotePath {
        &self.base_dir
    }

    /// The stable string key used to scope persisted rows
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}::{}", self.vault, self.base_dir)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
