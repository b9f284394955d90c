//! opsgate: a role-gated approval and deletion kernel.
//!
//! Three pieces compose over one document store:
//!
//! - a weekly step-up credential (six digits, one per ISO week, validated
//!   on every destructive call and rotatable on demand),
//! - an approval workflow for queued privileged actions, resolved by
//!   whichever role the permission matrix allows,
//! - a soft-deletion workflow where admins delete in place and managers
//!   queue deletions for an admin verdict, every delete leaving a
//!   restorable snapshot in the deletion log.
//!
//! [`Gate`] is the facade callers hold; it is generic over any
//! [`opsgate_store::DocumentStore`].

pub mod approval;
pub mod clock;
mod codec;
pub mod collections;
pub mod credential;
pub mod deletion;
pub mod error;
pub mod gate;

pub use approval::{no_side_effect, ApprovalWorkflow};
pub use clock::{Clock, SystemClock};
pub use credential::{CredentialManager, UsageEvent};
pub use deletion::{DeletionOutcome, DeletionWorkflow};
pub use error::{GateError, Result};
pub use gate::{CredentialCheck, CredentialHandout, Gate, GateConfig};

pub use opsgate_core::{
    ApprovalRequest, ApprovalStatus, ApprovalType, Credential, Decision, DeletionLogEntry,
    DeletionLogStatus, DeletionRecord, DeletionRecordKind, DeletionRequest, DeletionRequestStatus,
    DocId, ItemType, RequestProvenance, UsageRecord, UsageStats, UserId, WeekId, SECRET_LEN,
};
pub use opsgate_perms::{Actor, Capability, Role};
pub use opsgate_store::{DocumentStore, MemoryStore, SqliteStore, StoreError};
