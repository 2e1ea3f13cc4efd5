//! StoreError - Uniform Failure Taxonomy
//!
//! TigerStyle: Every engine fault is classified into one of four kinds.
//! Only success and `DuplicateToken` leave observable state behind; every
//! other kind means the operation did not take effect.

use thiserror::Error;

/// Result type for counter store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by every counter store engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Target token (or token/namespace pair) does not exist.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token creation collided with an existing counter.
    #[error("duplicate token: {0}")]
    DuplicateToken(String),

    /// Transient back-end fault: connection loss, timeout, lock wait.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Connection string names an engine this build cannot construct.
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),
}

impl StoreError {
    /// Token or namespace target is missing.
    pub fn invalid_token(token: impl Into<String>) -> Self {
        Self::InvalidToken(token.into())
    }

    /// Token already exists.
    pub fn duplicate_token(token: impl Into<String>) -> Self {
        Self::DuplicateToken(token.into())
    }

    /// Back end could not complete the operation.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Unknown or disabled engine.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedBackend(msg.into())
    }

    /// Whether the caller may reasonably try the same request again.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::invalid_token("abc").to_string(),
            "invalid token: abc"
        );
        assert_eq!(
            StoreError::unsupported("mysql").to_string(),
            "unsupported backend: mysql"
        );
    }

    #[test]
    fn test_is_retriable() {
        assert!(StoreError::unavailable("timeout").is_retriable());
        assert!(!StoreError::invalid_token("abc").is_retriable());
        assert!(!StoreError::duplicate_token("abc").is_retriable());
        assert!(!StoreError::unsupported("mysql").is_retriable());
    }
}
