//! # Opsgate Core
//!
//! Pure primitives for the opsgate workflow kernel: step-up credentials,
//! approval and deletion records, and calendar-week arithmetic.
//!
//! This crate contains no I/O, no storage, no transport. It is pure
//! computation over domain data structures.
//!
//! ## Key Types
//!
//! - [`Credential`] - A weekly-rotating shared secret used as a step-up factor
//! - [`ApprovalRequest`] - A queued privileged action awaiting approval
//! - [`DeletionLogEntry`] - A resolved soft-delete with a restorable snapshot
//! - [`WeekId`] - Monday-start calendar key scoping credential validity
//!
//! ## Week arithmetic
//!
//! Week boundaries use ISO weeks (Monday is day 1), computed with chrono's
//! calendar routines rather than hand-rolled date math. See [`week`].

pub mod approval;
pub mod credential;
pub mod deletion;
pub mod error;
pub mod secret;
pub mod types;
pub mod week;

pub use approval::{ApprovalRequest, ApprovalStatus, ApprovalType, Decision};
pub use credential::{Credential, RequestProvenance, UsageRecord, UsageStats};
pub use deletion::{
    DeletionLogEntry, DeletionLogStatus, DeletionRecord, DeletionRecordKind, DeletionRequest,
    DeletionRequestStatus, ItemType,
};
pub use error::CoreError;
pub use secret::{generate_secret, is_well_formed, SecretHash, SECRET_LEN};
pub use types::{DocId, UserId};
pub use week::{week_end, week_start, WeekId};
