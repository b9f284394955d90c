//! Error types for opsgate core.

use thiserror::Error;

/// Core errors for domain-level validation failures.
///
/// These are deterministic, terminal errors: retrying the same input will
/// fail the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed identifier: {0}")]
    MalformedId(String),

    #[error("unknown item type: {0}")]
    UnknownItemType(String),

    #[error("unknown approval type: {0}")]
    UnknownApprovalType(String),

    #[error("credential must be a {expected}-digit numeric code")]
    MalformedSecret { expected: usize },

    #[error("invalid week id: {0}")]
    InvalidWeekId(String),
}
