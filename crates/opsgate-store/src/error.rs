//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Every variant here is infrastructure-class: safe for the caller to retry
/// with backoff. Logical conflicts (unique-key races, failed guards) are
/// reported through return values, not through this enum.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored data that does not parse back into its record shape.
    #[error("invalid data in collection {collection}: {message}")]
    InvalidData { collection: String, message: String },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
