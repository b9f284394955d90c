//! The gate facade: the one entry point callers hold.
//!
//! A [`Gate`] wires the credential manager and the two workflows over a
//! shared store and a clock, and layers the role checks that are about
//! *seeing* things (credentials, history, stats) on top. The workflows
//! enforce their own transition rules; the facade never re-implements them.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use opsgate_core::{
    ApprovalRequest, ApprovalStatus, ApprovalType, Decision, DeletionRecord, DeletionRecordKind,
    DocId, ItemType, RequestProvenance, UsageStats, SECRET_LEN,
};
use opsgate_perms::{is_allowed, Actor, Capability};
use opsgate_store::DocumentStore;

use crate::approval::ApprovalWorkflow;
use crate::clock::{Clock, SystemClock};
use crate::credential::CredentialManager;
use crate::deletion::{DeletionOutcome, DeletionWorkflow};
use crate::error::{GateError, Result};

/// Gate construction knobs.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Digit count of the weekly secret.
    pub secret_len: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            secret_len: SECRET_LEN,
        }
    }
}

/// The weekly secret as handed to an authorized viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHandout {
    pub plaintext: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a standalone credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialCheck {
    pub valid: bool,
    /// Set when `valid`; identifies the credential that matched.
    pub credential_id: Option<DocId>,
}

/// The approval and deletion gate over a document store.
pub struct Gate<S> {
    credentials: CredentialManager<S>,
    approvals: ApprovalWorkflow<S>,
    deletions: DeletionWorkflow<S>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> Gate<S> {
    /// Build a gate on the system clock.
    pub fn new(store: Arc<S>, config: GateConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Build a gate with an injected clock. Tests use this to pin time and
    /// cross week boundaries without sleeping.
    pub fn with_clock(store: Arc<S>, config: GateConfig, clock: Arc<dyn Clock>) -> Self {
        let credentials = CredentialManager::new(Arc::clone(&store), config.secret_len);
        Self {
            approvals: ApprovalWorkflow::new(Arc::clone(&store)),
            deletions: DeletionWorkflow::new(Arc::clone(&store), credentials.clone()),
            credentials,
            store,
            clock,
        }
    }

    /// The underlying store, for fixtures that seed target records.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ────────────────────────── credentials ──────────────────────────

    /// Hand the viewer this week's secret, issuing one if the week has none.
    pub async fn ensure_or_get_credential(&self, viewer: &Actor) -> Result<CredentialHandout> {
        self.require(viewer, Capability::ViewCredential)?;
        let credential = self.credentials.ensure_active(self.clock.now()).await?;
        Ok(CredentialHandout {
            plaintext: credential.secret_plaintext,
            expires_at: credential.expires_at,
        })
    }

    /// Supersede the current secret immediately, even mid-week.
    pub async fn force_rotate_credential(&self, caller: &Actor) -> Result<CredentialHandout> {
        self.require(caller, Capability::RotateCredential)?;
        let credential = self.credentials.generate(true, self.clock.now()).await?;
        Ok(CredentialHandout {
            plaintext: credential.secret_plaintext,
            expires_at: credential.expires_at,
        })
    }

    /// Check a secret without consuming it. A mismatch is reported as
    /// `valid: false`, never as an error; only infrastructure failures and
    /// malformed input propagate.
    pub async fn validate_credential(&self, secret: &str) -> Result<CredentialCheck> {
        match self.credentials.validate(secret, self.clock.now()).await {
            Ok(id) => Ok(CredentialCheck {
                valid: true,
                credential_id: Some(id),
            }),
            Err(GateError::Unauthorized(_)) => Ok(CredentialCheck {
                valid: false,
                credential_id: None,
            }),
            Err(e) => Err(e),
        }
    }

    // ────────────────────────── approvals ──────────────────────────

    /// File an approval request for a queued privileged action.
    pub async fn create_approval_request(
        &self,
        kind: ApprovalType,
        job_id: impl Into<String>,
        requester: &Actor,
        request_data: Value,
        metadata: Value,
    ) -> Result<ApprovalRequest> {
        self.approvals
            .create(kind, job_id, requester, request_data, metadata, self.clock.now())
            .await
    }

    /// List approval requests visible to the caller, newest first.
    pub async fn list_approval_requests(
        &self,
        caller: &Actor,
        status: Option<ApprovalStatus>,
        kind: Option<ApprovalType>,
    ) -> Result<Vec<ApprovalRequest>> {
        self.approvals.list(caller, status, kind).await
    }

    /// Resolve a pending approval request. On approve, `on_approve` runs
    /// before the status flips and must succeed for the flip to happen.
    pub async fn resolve_approval_request<F, Fut>(
        &self,
        request_id: DocId,
        resolver: &Actor,
        decision: Decision,
        rejection_reason: Option<String>,
        on_approve: F,
    ) -> Result<ApprovalRequest>
    where
        F: FnOnce(ApprovalRequest) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        self.approvals
            .resolve(
                request_id,
                resolver,
                decision,
                rejection_reason,
                on_approve,
                self.clock.now(),
            )
            .await
    }

    // ────────────────────────── deletions ──────────────────────────

    /// Delete a record or queue its deletion, per the caller's role.
    ///
    /// `item_type` arrives as a string at this boundary and is parsed
    /// before anything else happens; unknown kinds fail as validation
    /// errors without touching the store.
    pub async fn request_deletion(
        &self,
        item_type: &str,
        item_id: DocId,
        reason: impl Into<String>,
        caller: &Actor,
        secret: &str,
        provenance: Option<RequestProvenance>,
    ) -> Result<DeletionOutcome> {
        let item_type = ItemType::from_str(item_type)?;
        self.deletions
            .request_delete(
                item_type,
                item_id,
                reason,
                caller,
                secret,
                provenance,
                self.clock.now(),
            )
            .await
    }

    /// Approve or reject a queued deletion. Approval returns the log entry
    /// id that can later restore the record.
    pub async fn resolve_deletion(
        &self,
        request_id: DocId,
        approve: bool,
        rejection_reason: Option<String>,
        caller: &Actor,
        secret: &str,
        provenance: Option<RequestProvenance>,
    ) -> Result<Option<DocId>> {
        self.deletions
            .resolve(
                request_id,
                approve,
                rejection_reason,
                caller,
                secret,
                provenance,
                self.clock.now(),
            )
            .await
    }

    /// Restore a soft-deleted record from its log entry.
    pub async fn restore_deleted(
        &self,
        log_id: DocId,
        caller: &Actor,
        secret: &str,
        provenance: Option<RequestProvenance>,
    ) -> Result<DocId> {
        self.deletions
            .restore(log_id, caller, secret, provenance, self.clock.now())
            .await
    }

    /// List deletion records, newest first.
    pub async fn list_deletion_records(
        &self,
        caller: &Actor,
        kind: DeletionRecordKind,
    ) -> Result<Vec<DeletionRecord>> {
        self.require(caller, Capability::AccessHistory)?;
        self.deletions.list(kind).await
    }

    // ────────────────────────── audit ──────────────────────────

    /// Aggregate credential usage over a trailing window of days.
    pub async fn usage_stats(&self, caller: &Actor, window_days: u32) -> Result<UsageStats> {
        self.require(caller, Capability::AccessHistory)?;
        self.credentials.stats(window_days, self.clock.now()).await
    }

    fn require(&self, actor: &Actor, capability: Capability) -> Result<()> {
        if is_allowed(actor.role, capability) {
            Ok(())
        } else {
            Err(GateError::unauthorized(format!(
                "role {} lacks {capability:?}",
                actor.role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_core::UserId;
    use opsgate_perms::Role;
    use opsgate_store::MemoryStore;

    fn gate() -> Gate<MemoryStore> {
        Gate::new(Arc::new(MemoryStore::new()), GateConfig::default())
    }

    fn actor(name: &str, role: Role) -> Actor {
        Actor::new(UserId::new(name), role)
    }

    #[tokio::test]
    async fn test_staff_cannot_view_the_credential() {
        let gate = gate();
        let err = gate
            .ensure_or_get_credential(&actor("staff-1", Role::Staff))
            .await;
        assert!(matches!(err, Err(GateError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_only_admin_rotates() {
        let gate = gate();
        let err = gate
            .force_rotate_credential(&actor("mgr-1", Role::Manager))
            .await;
        assert!(matches!(err, Err(GateError::Unauthorized(_))));

        let handout = gate
            .force_rotate_credential(&actor("admin-1", Role::Admin))
            .await
            .unwrap();
        assert_eq!(handout.plaintext.len(), SECRET_LEN);
    }

    #[tokio::test]
    async fn test_validate_credential_reports_mismatch_without_error() {
        let gate = gate();
        let handout = gate
            .ensure_or_get_credential(&actor("admin-1", Role::Admin))
            .await
            .unwrap();

        let good = gate.validate_credential(&handout.plaintext).await.unwrap();
        assert!(good.valid);
        assert!(good.credential_id.is_some());

        let wrong = if handout.plaintext == "000000" { "000001" } else { "000000" };
        let bad = gate.validate_credential(wrong).await.unwrap();
        assert!(!bad.valid);
        assert!(bad.credential_id.is_none());

        // Malformed input is still an error, not a quiet false.
        assert!(matches!(
            gate.validate_credential("12ab").await,
            Err(GateError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_item_type_fails_before_the_store() {
        let gate = gate();
        let handout = gate
            .ensure_or_get_credential(&actor("admin-1", Role::Admin))
            .await
            .unwrap();
        let err = gate
            .request_deletion(
                "invoice",
                DocId::generate(),
                "x",
                &actor("admin-1", Role::Admin),
                &handout.plaintext,
                None,
            )
            .await;
        assert!(matches!(err, Err(GateError::Validation(_))));
    }

    #[tokio::test]
    async fn test_history_is_admin_and_manager_only() {
        let gate = gate();
        let err = gate
            .list_deletion_records(&actor("staff-1", Role::Staff), DeletionRecordKind::All)
            .await;
        assert!(matches!(err, Err(GateError::Unauthorized(_))));

        assert!(gate
            .list_deletion_records(&actor("mgr-1", Role::Manager), DeletionRecordKind::All)
            .await
            .unwrap()
            .is_empty());

        let err = gate.usage_stats(&actor("staff-1", Role::Staff), 7).await;
        assert!(matches!(err, Err(GateError::Unauthorized(_))));
    }
}
