//! Soft-delete record types.
//!
//! Deletions live in two physical shapes: queued requests awaiting an admin
//! verdict (`deletion_requests`) and resolved entries with a restorable
//! snapshot (`deletion_log`). Workflow code exposes them behind one
//! state-machine interface; callers never branch on collection name.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{DocId, UserId};

/// The closed set of record kinds that may be soft-deleted.
///
/// Unknown kinds fail fast at the parse boundary, before any store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Job,
    Bill,
    Payment,
}

impl ItemType {
    pub const ALL: [ItemType; 3] = [ItemType::Job, ItemType::Bill, ItemType::Payment];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Job => "job",
            ItemType::Bill => "bill",
            ItemType::Payment => "payment",
        }
    }

    /// The store collection holding records of this type.
    pub fn collection(self) -> &'static str {
        match self {
            ItemType::Job => "jobs",
            ItemType::Bill => "bills",
            ItemType::Payment => "payments",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(ItemType::Job),
            "bill" => Ok(ItemType::Bill),
            "payment" => Ok(ItemType::Payment),
            other => Err(CoreError::UnknownItemType(other.to_string())),
        }
    }
}

/// Lifecycle state of a queued deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionRequestStatus {
    PendingApproval,
    Rejected,
}

/// Lifecycle state of a resolved deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionLogStatus {
    Deleted,
    Restored,
}

/// A queued deletion awaiting an admin verdict. The target is untouched
/// until approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub id: DocId,
    pub item_type: ItemType,
    pub item_id: DocId,
    pub reason: String,
    pub requested_by: UserId,
    pub requested_at: DateTime<Utc>,
    pub status: DeletionRequestStatus,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// A resolved deletion, carrying a verbatim snapshot of the target as it
/// was at deletion time so a restore can be audited against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionLogEntry {
    pub id: DocId,
    pub original_id: DocId,
    pub item_type: ItemType,
    /// Snapshot of the record before tombstone fields were applied.
    pub original_data: Value,
    pub deleted_by: UserId,
    pub deleted_at: DateTime<Utc>,
    pub reason: String,
    pub restorable: bool,
    pub status: DeletionLogStatus,
    pub restored_by: Option<UserId>,
    pub restored_at: Option<DateTime<Utc>>,
}

/// Which deletion records a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionRecordKind {
    /// Resolved entries from the deletion log.
    Deleted,
    /// Queued requests (pending or rejected).
    Pending,
    /// Both shapes merged.
    All,
}

/// One logical deletion record, regardless of which collection holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum DeletionRecord {
    Queued(DeletionRequest),
    Resolved(DeletionLogEntry),
}
