//! Approval request records and their state machine vocabulary.
//!
//! An approval request is a queued privileged action. Only a `pending`
//! request may transition; `approved` and `rejected` are terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{DocId, UserId};

/// The kind of privileged action being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    Part,
    Service,
    Payment,
    StatusChange,
    CreditPayment,
}

impl ApprovalType {
    pub const ALL: [ApprovalType; 5] = [
        ApprovalType::Part,
        ApprovalType::Service,
        ApprovalType::Payment,
        ApprovalType::StatusChange,
        ApprovalType::CreditPayment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalType::Part => "part",
            ApprovalType::Service => "service",
            ApprovalType::Payment => "payment",
            ApprovalType::StatusChange => "status_change",
            ApprovalType::CreditPayment => "credit_payment",
        }
    }
}

impl fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "part" => Ok(ApprovalType::Part),
            "service" => Ok(ApprovalType::Service),
            "payment" => Ok(ApprovalType::Payment),
            "status_change" => Ok(ApprovalType::StatusChange),
            "credit_payment" => Ok(ApprovalType::CreditPayment),
            other => Err(CoreError::UnknownApprovalType(other.to_string())),
        }
    }
}

/// Lifecycle state of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// A resolver's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// A queued privileged action awaiting resolution by a higher role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: DocId,
    pub kind: ApprovalType,
    /// The job this request belongs to (opaque to the workflow).
    pub job_id: String,
    pub requested_by: UserId,
    /// Opaque payload interpreted by the consuming operation on approve.
    pub request_data: Value,
    /// Display-oriented summary for approval queues.
    pub metadata: Value,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl ApprovalRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_type_string_round_trip() {
        for kind in ApprovalType::ALL {
            assert_eq!(kind.as_str().parse::<ApprovalType>().unwrap(), kind);
        }
        assert!(matches!(
            "refund".parse::<ApprovalType>(),
            Err(CoreError::UnknownApprovalType(_))
        ));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_serde_uses_snake_case_tags() {
        assert_eq!(
            serde_json::to_value(ApprovalType::CreditPayment).unwrap(),
            serde_json::json!("credit_payment")
        );
        assert_eq!(
            serde_json::to_value(ApprovalStatus::Pending).unwrap(),
            serde_json::json!("pending")
        );
    }
}
