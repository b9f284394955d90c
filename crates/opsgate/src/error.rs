//! Error types for the gate workflows.

use thiserror::Error;

use opsgate_core::CoreError;
use opsgate_store::StoreError;

/// Errors that can occur during gate operations.
///
/// Every variant except [`GateError::Store`] is terminal: retrying the same
/// call will fail the same way. `Store` wraps infrastructure failures and is
/// safe to retry with backoff.
#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed input, rejected before any state was touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Role/permission denial or an invalid/expired credential.
    ///
    /// The message never reveals whether a credential was wrong, expired,
    /// or superseded.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The target record is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A transition was attempted from a non-eligible state. Usually means
    /// the caller raced another resolver or holds a stale view.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A uniqueness race that could not be resolved by re-reading.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage error (retryable infrastructure failure).
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl GateError {
    /// Stable machine-checkable kind for transports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Validation(_) => "validation",
            GateError::Unauthorized(_) => "unauthorized",
            GateError::NotFound(_) => "not_found",
            GateError::InvalidState(_) => "invalid_state",
            GateError::Conflict(_) => "conflict",
            GateError::Store(_) => "infrastructure",
        }
    }

    /// Whether a caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Store(_))
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        GateError::NotFound(what.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        GateError::InvalidState(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        GateError::Unauthorized(msg.into())
    }
}

impl From<CoreError> for GateError {
    fn from(e: CoreError) -> Self {
        GateError::Validation(e.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::Store(StoreError::Serialization(e.to_string()))
    }
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(GateError::Validation("x".into()).kind(), "validation");
        assert_eq!(GateError::Unauthorized("x".into()).kind(), "unauthorized");
        assert_eq!(GateError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(GateError::InvalidState("x".into()).kind(), "invalid_state");
        assert_eq!(GateError::Conflict("x".into()).kind(), "conflict");
    }

    #[test]
    fn test_only_store_errors_retry() {
        let infra = GateError::Store(StoreError::Serialization("boom".into()));
        assert!(infra.is_retryable());
        assert!(!GateError::Unauthorized("no".into()).is_retryable());
    }
}
