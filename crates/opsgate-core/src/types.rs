//! Strong type definitions for opsgate.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of a stored document.
///
/// Generated by the component that creates the record (random v4), never by
/// the storage layer. The store treats it as an opaque key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(Uuid);

impl DocId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for DocId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s)
            .map(Self)
            .map_err(|e| CoreError::MalformedId(format!("{s}: {e}")))
    }
}

/// Identifier of an acting user.
///
/// Opaque at this layer: identity resolution (sessions, tokens, providers)
/// happens outside the kernel, which only consumes the resolved id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_round_trips_through_string() {
        let id = DocId::generate();
        let parsed: DocId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_doc_id_rejects_garbage() {
        let err = "not-a-uuid".parse::<DocId>().unwrap_err();
        assert!(matches!(err, CoreError::MalformedId(_)));
    }

    #[test]
    fn test_user_id_is_opaque_string() {
        let user = UserId::new("u-1042");
        assert_eq!(user.as_str(), "u-1042");
        assert_eq!(user, UserId::from("u-1042"));
    }
}
