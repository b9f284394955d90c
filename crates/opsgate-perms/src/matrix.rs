//! The role × capability lookup table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use opsgate_core::ApprovalType;

/// A caller's resolved role.
///
/// Identity resolution happens outside the kernel; only the resolved role
/// enters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Staff];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Parse failure for a role string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// A named capability in the permission matrix.
///
/// Request/approve pairs exist per approval type; the deletion workflow has
/// its own trio (direct delete, queued request, verdict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RequestParts,
    RequestServices,
    RequestPayments,
    RequestStatusChanges,
    RequestCreditPayments,
    ApproveParts,
    ApproveServices,
    ApprovePayments,
    ApproveStatusChanges,
    ApproveCreditPayments,
    /// Delete in place, without queueing for approval.
    DeleteDirect,
    /// Queue a deletion for an admin verdict.
    RequestDeletions,
    /// Approve, reject, or restore deletions.
    ApproveDeletions,
    /// View deletion history and usage statistics.
    AccessHistory,
    /// See the current credential plaintext.
    ViewCredential,
    /// Force-rotate the credential.
    RotateCredential,
}

impl Capability {
    pub const ALL: [Capability; 16] = [
        Capability::RequestParts,
        Capability::RequestServices,
        Capability::RequestPayments,
        Capability::RequestStatusChanges,
        Capability::RequestCreditPayments,
        Capability::ApproveParts,
        Capability::ApproveServices,
        Capability::ApprovePayments,
        Capability::ApproveStatusChanges,
        Capability::ApproveCreditPayments,
        Capability::DeleteDirect,
        Capability::RequestDeletions,
        Capability::ApproveDeletions,
        Capability::AccessHistory,
        Capability::ViewCredential,
        Capability::RotateCredential,
    ];
}

/// The capability needed to file an approval request of the given kind.
pub fn request_capability(kind: ApprovalType) -> Capability {
    match kind {
        ApprovalType::Part => Capability::RequestParts,
        ApprovalType::Service => Capability::RequestServices,
        ApprovalType::Payment => Capability::RequestPayments,
        ApprovalType::StatusChange => Capability::RequestStatusChanges,
        ApprovalType::CreditPayment => Capability::RequestCreditPayments,
    }
}

/// The capability needed to resolve an approval request of the given kind.
pub fn approve_capability(kind: ApprovalType) -> Capability {
    match kind {
        ApprovalType::Part => Capability::ApproveParts,
        ApprovalType::Service => Capability::ApproveServices,
        ApprovalType::Payment => Capability::ApprovePayments,
        ApprovalType::StatusChange => Capability::ApproveStatusChanges,
        ApprovalType::CreditPayment => Capability::ApproveCreditPayments,
    }
}

/// The permission matrix. Total: every (role, capability) pair resolves to
/// a boolean, never an error.
pub fn is_allowed(role: Role, capability: Capability) -> bool {
    use Capability::*;
    match role {
        Role::Admin => true,
        Role::Manager => matches!(
            capability,
            RequestParts
                | RequestServices
                | RequestPayments
                | RequestStatusChanges
                | RequestCreditPayments
                | ApproveParts
                | ApproveServices
                | ApproveStatusChanges
                | RequestDeletions
                | AccessHistory
        ),
        Role::Staff => matches!(
            capability,
            RequestParts | RequestServices | RequestStatusChanges
        ),
    }
}
