pub mod identity;
pub mod repository;

pub use identity::{Identity, IdentityError, IdentityProvider};
pub use repository::{ProductLookup, StallLookup, UserLookup};

/// Failure of a persistence call. Always an infrastructure concern, never a
/// domain rule violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Storage operation timed out")]
    Timeout,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Transient failures a caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

impl From<campus_shared::models::UnknownVariant> for StoreError {
    fn from(err: campus_shared::models::UnknownVariant) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Timeout.is_retryable());
        assert!(StoreError::Unavailable("pool closed".into()).is_retryable());
        assert!(!StoreError::Backend("syntax error".into()).is_retryable());
    }
}
