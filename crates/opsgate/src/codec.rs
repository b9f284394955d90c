//! Typed record <-> JSON document conversion.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use opsgate_store::StoreError;

use crate::error::{GateError, Result};

/// Decode a stored document body into its record type.
///
/// A decode failure means the collection holds data this build cannot read;
/// that is an infrastructure problem, not a caller error.
pub(crate) fn decode<T: DeserializeOwned>(collection: &str, body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| {
        GateError::Store(StoreError::InvalidData {
            collection: collection.to_string(),
            message: e.to_string(),
        })
    })
}

/// Encode a record into a JSON document body.
pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(GateError::from)
}
