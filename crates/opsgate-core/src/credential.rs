//! Credential and usage-ledger record types.
//!
//! A credential is the weekly step-up secret. Usage records are the
//! append-only audit trail written every time the secret is consumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::secret::SecretHash;
use crate::types::{DocId, UserId};
use crate::week::WeekId;

/// A weekly-rotating shared secret.
///
/// At most one credential is active at any time; issuing a new one
/// deactivates every previous active record. Expiry is enforced at
/// validation time, not by a background sweep: an active record past its
/// `expires_at` no longer validates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: DocId,
    pub week_id: WeekId,
    /// Plaintext code, kept so the admin surface can re-display the current
    /// secret. Lookups compare hashes, never this field.
    pub secret_plaintext: String,
    pub secret_hash: SecretHash,
    pub created_at: DateTime<Utc>,
    /// Sunday 23:59:59.999 UTC of the credential's week.
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether this credential is still inside its validity window.
    pub fn is_unexpired(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Where a gated request came from, when the transport layer knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProvenance {
    /// Caller network address, e.g. `"203.0.113.9"`.
    pub remote_addr: Option<String>,
    /// Client identifier string, e.g. a user-agent header.
    pub client_id: Option<String>,
}

/// One immutable entry in the credential usage ledger.
///
/// Appended whenever the secondary credential gates an operation. Never
/// updated or deleted; referential integrity to the credential is enforced
/// by the writer, not the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: DocId,
    pub credential_id: DocId,
    pub user_id: UserId,
    /// Symbolic tag for the gated operation, e.g. `"direct_delete"`.
    pub action: String,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
    /// Free-form context supplied by the gated operation.
    pub metadata: Option<Value>,
    pub provenance: Option<RequestProvenance>,
    pub recorded_at: DateTime<Utc>,
}

/// Read-only aggregation over the usage ledger for a trailing window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub window_days: u32,
    pub total_usage: u64,
    /// Count per action tag.
    pub per_action: BTreeMap<String, u64>,
    /// Count per acting user.
    pub per_user: BTreeMap<String, u64>,
    /// Count per UTC day, keyed `"YYYY-MM-DD"`.
    pub per_day: BTreeMap<String, u64>,
}

impl UsageStats {
    /// Fold usage records into aggregate counts.
    ///
    /// Callers pre-filter to the window; this only counts.
    pub fn aggregate(window_days: u32, records: &[UsageRecord]) -> Self {
        let mut stats = Self {
            window_days,
            ..Self::default()
        };
        for record in records {
            stats.total_usage += 1;
            *stats.per_action.entry(record.action.clone()).or_default() += 1;
            *stats
                .per_user
                .entry(record.user_id.to_string())
                .or_default() += 1;
            let day = record.recorded_at.format("%Y-%m-%d").to_string();
            *stats.per_day.entry(day).or_default() += 1;
        }
        stats
    }
}
