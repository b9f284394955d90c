//! Logical collection names.
//!
//! The store is one flat namespace of collections; these constants are the
//! only place names appear, so the workflows never branch on raw strings.

pub const CREDENTIALS: &str = "credentials";
pub const CREDENTIAL_USAGE: &str = "credential_usage";
pub const APPROVAL_REQUESTS: &str = "approval_requests";
pub const DELETION_REQUESTS: &str = "deletion_requests";
pub const DELETION_LOG: &str = "deletion_log";
