//! Domain error types

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote path format or content
    #[error("Invalid remote path: {0}")]
    InvalidPath(String),

    /// Invalid namespace component
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Unknown sync phase string
    #[error("Unknown sync phase: {0}")]
    UnknownPhase(String),

    /// Malformed href received from the remote
    #[error("Invalid href: {0}")]
    InvalidHref(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPath("foo//bar".to_string());
        assert_eq!(err.to_string(), "Invalid remote path: foo//bar");

        let err = DomainError::UnknownPhase("paused".to_string());
        assert_eq!(err.to_string(), "Unknown sync phase: paused");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidPath("/p".to_string());
        let err2 = DomainError::InvalidPath("/p".to_string());
        assert_eq!(err1, err2);
        assert_ne!(err1, DomainError::InvalidPath("/q".to_string()));
    }
}
