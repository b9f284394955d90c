//! The deletion workflow: credential-gated soft deletes, queued requests,
//! and restores.
//!
//! A delete never destroys data. Direct deletes tombstone the target in
//! place and write a restorable snapshot to the deletion log; queued
//! deletes leave the target untouched until an admin approves. Every
//! operation here consumes the weekly credential and lands in the usage
//! ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use opsgate_core::{
    DeletionLogEntry, DeletionLogStatus, DeletionRecord, DeletionRecordKind, DeletionRequest,
    DeletionRequestStatus, DocId, ItemType, RequestProvenance,
};
use opsgate_perms::{is_allowed, Actor, Capability};
use opsgate_store::{DocumentStore, Filter, Patch};

use crate::codec::{decode, encode};
use crate::collections;
use crate::credential::{CredentialManager, UsageEvent};
use crate::error::{GateError, Result};

/// Tombstone fields stamped onto a soft-deleted target.
const TOMBSTONE_FIELDS: [&str; 4] = ["deleted", "deleted_at", "deleted_by", "deletion_reason"];

/// What a delete call actually did, which depends on the caller's role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The target was tombstoned immediately; the log entry can restore it.
    Deleted { log_id: DocId },
    /// The delete was queued for admin approval; the target is untouched.
    PendingApproval { request_id: DocId },
}

/// Owns soft deletion, deletion approval, and restore.
pub struct DeletionWorkflow<S> {
    store: Arc<S>,
    credentials: CredentialManager<S>,
}

impl<S> Clone for DeletionWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            credentials: self.credentials.clone(),
        }
    }
}

impl<S: DocumentStore> DeletionWorkflow<S> {
    pub(crate) fn new(store: Arc<S>, credentials: CredentialManager<S>) -> Self {
        Self { store, credentials }
    }

    /// Delete a record, or queue its deletion, depending on the caller's
    /// role. The credential check comes first: no state is read or written
    /// for a caller who cannot present this week's secret.
    pub async fn request_delete(
        &self,
        item_type: ItemType,
        item_id: DocId,
        reason: impl Into<String>,
        caller: &Actor,
        secret: &str,
        provenance: Option<RequestProvenance>,
        now: DateTime<Utc>,
    ) -> Result<DeletionOutcome> {
        let credential_id = self.credentials.validate(secret, now).await?;
        let reason = reason.into();

        let direct = is_allowed(caller.role, Capability::DeleteDirect);
        if !direct && !is_allowed(caller.role, Capability::RequestDeletions) {
            return Err(GateError::unauthorized(format!(
                "role {} may not delete or request deletion of records",
                caller.role
            )));
        }

        let target = self
            .store
            .get(item_type.collection(), item_id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("{item_type} {item_id}")))?;
        if target.get("deleted") == Some(&json!(true)) {
            return Err(GateError::invalid_state(format!(
                "{item_type} {item_id} is already deleted"
            )));
        }

        if direct {
            let log_id = self
                .tombstone_and_log(item_type, item_id, target, &reason, &caller.user_id, now)
                .await?;
            self.credentials
                .record_usage(
                    UsageEvent {
                        credential_id,
                        user_id: caller.user_id.clone(),
                        action: "direct_delete".into(),
                        target_id: Some(item_id.to_string()),
                        target_type: Some(item_type.as_str().to_string()),
                        metadata: Some(json!({ "reason": reason })),
                        provenance,
                    },
                    now,
                )
                .await?;
            return Ok(DeletionOutcome::Deleted { log_id });
        }

        // One pending request per target at a time.
        let duplicate = Filter::all()
            .eq("item_type", json!(item_type.as_str()))
            .eq("item_id", json!(item_id.to_string()))
            .eq(
                "status",
                serde_json::to_value(DeletionRequestStatus::PendingApproval)?,
            );
        if !self
            .store
            .find(collections::DELETION_REQUESTS, &duplicate)
            .await?
            .is_empty()
        {
            return Err(GateError::Conflict(format!(
                "a deletion request for {item_type} {item_id} is already pending"
            )));
        }

        let request = DeletionRequest {
            id: DocId::generate(),
            item_type,
            item_id,
            reason: reason.clone(),
            requested_by: caller.user_id.clone(),
            requested_at: now,
            status: DeletionRequestStatus::PendingApproval,
            resolved_by: None,
            resolved_at: None,
            rejection_reason: None,
        };
        self.store
            .insert(collections::DELETION_REQUESTS, request.id, &encode(&request)?)
            .await?;
        tracing::info!(id = %request.id, target = %item_id, kind = %item_type, "deletion queued for approval");

        self.credentials
            .record_usage(
                UsageEvent {
                    credential_id,
                    user_id: caller.user_id.clone(),
                    action: "deletion_requested".into(),
                    target_id: Some(item_id.to_string()),
                    target_type: Some(item_type.as_str().to_string()),
                    metadata: Some(json!({ "reason": reason, "request_id": request.id })),
                    provenance,
                },
                now,
            )
            .await?;
        Ok(DeletionOutcome::PendingApproval {
            request_id: request.id,
        })
    }

    /// Approve or reject a queued deletion request.
    ///
    /// Approval claims the request with a guarded `migrating` flag before
    /// tombstoning, so a racing approve or reject sees a non-pending record
    /// and fails with an invalid-state error. On approval the request is
    /// removed; its history lives on in the log entry.
    pub async fn resolve(
        &self,
        request_id: DocId,
        approve: bool,
        rejection_reason: Option<String>,
        caller: &Actor,
        secret: &str,
        provenance: Option<RequestProvenance>,
        now: DateTime<Utc>,
    ) -> Result<Option<DocId>> {
        let credential_id = self.credentials.validate(secret, now).await?;
        if !is_allowed(caller.role, Capability::ApproveDeletions) {
            return Err(GateError::unauthorized(format!(
                "role {} may not resolve deletion requests",
                caller.role
            )));
        }

        let body = self
            .store
            .get(collections::DELETION_REQUESTS, request_id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("deletion request {request_id}")))?;
        let request: DeletionRequest = decode(collections::DELETION_REQUESTS, body)?;
        if request.status != DeletionRequestStatus::PendingApproval {
            return Err(GateError::invalid_state(format!(
                "deletion request {request_id} is not pending"
            )));
        }

        let pending = Filter::all()
            .eq(
                "status",
                serde_json::to_value(DeletionRequestStatus::PendingApproval)?,
            )
            .absent("migrating");

        if approve {
            // Claim the request before touching the target. Losing this CAS
            // means another resolver got here first.
            let claimed = self
                .store
                .update_if(
                    collections::DELETION_REQUESTS,
                    request_id,
                    &pending,
                    &Patch::new().set("migrating", json!(true)),
                )
                .await?;
            if !claimed {
                return Err(GateError::invalid_state(format!(
                    "deletion request {request_id} was resolved concurrently"
                )));
            }

            let log_id = match self.approve_claimed(&request, caller, now).await {
                Ok(log_id) => log_id,
                Err(e) => {
                    // Give the claim back so the request can be retried.
                    if let Err(rollback) = self
                        .store
                        .update(
                            collections::DELETION_REQUESTS,
                            request_id,
                            &Patch::new().unset("migrating"),
                        )
                        .await
                    {
                        tracing::warn!(
                            id = %request_id,
                            error = %rollback,
                            "failed to release claim on deletion request"
                        );
                    }
                    return Err(e);
                }
            };

            self.store
                .remove(collections::DELETION_REQUESTS, request_id)
                .await?;
            tracing::info!(id = %request_id, log = %log_id, "deletion request approved");

            self.credentials
                .record_usage(
                    UsageEvent {
                        credential_id,
                        user_id: caller.user_id.clone(),
                        action: "deletion_approved".into(),
                        target_id: Some(request.item_id.to_string()),
                        target_type: Some(request.item_type.as_str().to_string()),
                        metadata: Some(json!({ "request_id": request_id })),
                        provenance,
                    },
                    now,
                )
                .await?;
            Ok(Some(log_id))
        } else {
            let patch = Patch::new()
                .set(
                    "status",
                    serde_json::to_value(DeletionRequestStatus::Rejected)?,
                )
                .set("resolved_by", json!(caller.user_id.as_str()))
                .set("resolved_at", encode(&now)?)
                .set(
                    "rejection_reason",
                    json!(rejection_reason.as_deref().unwrap_or("")),
                );
            if !self
                .store
                .update_if(collections::DELETION_REQUESTS, request_id, &pending, &patch)
                .await?
            {
                return Err(GateError::invalid_state(format!(
                    "deletion request {request_id} was resolved concurrently"
                )));
            }
            tracing::info!(id = %request_id, "deletion request rejected");

            self.credentials
                .record_usage(
                    UsageEvent {
                        credential_id,
                        user_id: caller.user_id.clone(),
                        action: "deletion_rejected".into(),
                        target_id: Some(request.item_id.to_string()),
                        target_type: Some(request.item_type.as_str().to_string()),
                        metadata: Some(json!({ "request_id": request_id })),
                        provenance,
                    },
                    now,
                )
                .await?;
            Ok(None)
        }
    }

    /// Restore a deleted record from its log entry. One-shot: a restored
    /// entry cannot be restored again.
    pub async fn restore(
        &self,
        log_id: DocId,
        caller: &Actor,
        secret: &str,
        provenance: Option<RequestProvenance>,
        now: DateTime<Utc>,
    ) -> Result<DocId> {
        let credential_id = self.credentials.validate(secret, now).await?;
        if !is_allowed(caller.role, Capability::ApproveDeletions) {
            return Err(GateError::unauthorized(format!(
                "role {} may not restore deleted records",
                caller.role
            )));
        }

        let body = self
            .store
            .get(collections::DELETION_LOG, log_id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("deletion log entry {log_id}")))?;
        let entry: DeletionLogEntry = decode(collections::DELETION_LOG, body)?;

        if entry.status != DeletionLogStatus::Deleted {
            return Err(GateError::invalid_state(format!(
                "deletion log entry {log_id} was already restored"
            )));
        }
        if !entry.restorable {
            return Err(GateError::invalid_state(format!(
                "deletion log entry {log_id} is not restorable"
            )));
        }
        if self
            .store
            .get(entry.item_type.collection(), entry.original_id)
            .await?
            .is_none()
        {
            return Err(GateError::not_found(format!(
                "{} {} no longer exists",
                entry.item_type, entry.original_id
            )));
        }

        let still_deleted =
            Filter::all().eq("status", serde_json::to_value(DeletionLogStatus::Deleted)?);
        let flip = Patch::new()
            .set("status", serde_json::to_value(DeletionLogStatus::Restored)?)
            .set("restored_by", json!(caller.user_id.as_str()))
            .set("restored_at", encode(&now)?);
        if !self
            .store
            .update_if(collections::DELETION_LOG, log_id, &still_deleted, &flip)
            .await?
        {
            return Err(GateError::invalid_state(format!(
                "deletion log entry {log_id} was restored concurrently"
            )));
        }

        let mut revive = Patch::new();
        for field in TOMBSTONE_FIELDS {
            revive = revive.unset(field);
        }
        if !self
            .store
            .update(entry.item_type.collection(), entry.original_id, &revive)
            .await?
        {
            tracing::warn!(
                target = %entry.original_id,
                "restore flipped the log entry but the target vanished"
            );
        }
        tracing::info!(log = %log_id, target = %entry.original_id, "deleted record restored");

        self.credentials
            .record_usage(
                UsageEvent {
                    credential_id,
                    user_id: caller.user_id.clone(),
                    action: "restore".into(),
                    target_id: Some(entry.original_id.to_string()),
                    target_type: Some(entry.item_type.as_str().to_string()),
                    metadata: Some(json!({ "log_id": log_id })),
                    provenance,
                },
                now,
            )
            .await?;
        Ok(entry.original_id)
    }

    /// List deletion records across both physical shapes, newest first.
    pub async fn list(&self, kind: DeletionRecordKind) -> Result<Vec<DeletionRecord>> {
        let mut records = Vec::new();

        if matches!(kind, DeletionRecordKind::Deleted | DeletionRecordKind::All) {
            for doc in self
                .store
                .find(collections::DELETION_LOG, &Filter::all())
                .await?
            {
                records.push(DeletionRecord::Resolved(decode(
                    collections::DELETION_LOG,
                    doc.body,
                )?));
            }
        }
        if matches!(kind, DeletionRecordKind::Pending | DeletionRecordKind::All) {
            for doc in self
                .store
                .find(collections::DELETION_REQUESTS, &Filter::all())
                .await?
            {
                records.push(DeletionRecord::Queued(decode(
                    collections::DELETION_REQUESTS,
                    doc.body,
                )?));
            }
        }

        records.sort_by_key(|r| {
            std::cmp::Reverse(match r {
                DeletionRecord::Queued(req) => req.requested_at,
                DeletionRecord::Resolved(entry) => entry.deleted_at,
            })
        });
        Ok(records)
    }

    /// Tombstone a live target and write its restorable log entry.
    ///
    /// `snapshot` must be the target's body as read before this call; it
    /// becomes the restore point.
    async fn tombstone_and_log(
        &self,
        item_type: ItemType,
        item_id: DocId,
        snapshot: Value,
        reason: &str,
        deleted_by: &opsgate_core::UserId,
        now: DateTime<Utc>,
    ) -> Result<DocId> {
        let tombstone = Patch::new()
            .set("deleted", json!(true))
            .set("deleted_at", encode(&now)?)
            .set("deleted_by", json!(deleted_by.as_str()))
            .set("deletion_reason", json!(reason));
        let live = Filter::all().absent("deleted");
        if !self
            .store
            .update_if(item_type.collection(), item_id, &live, &tombstone)
            .await?
        {
            return Err(GateError::invalid_state(format!(
                "{item_type} {item_id} was deleted concurrently"
            )));
        }

        let entry = DeletionLogEntry {
            id: DocId::generate(),
            original_id: item_id,
            item_type,
            original_data: snapshot,
            deleted_by: deleted_by.clone(),
            deleted_at: now,
            reason: reason.to_string(),
            restorable: true,
            status: DeletionLogStatus::Deleted,
            restored_by: None,
            restored_at: None,
        };
        self.store
            .insert(collections::DELETION_LOG, entry.id, &encode(&entry)?)
            .await?;
        tracing::info!(log = %entry.id, target = %item_id, kind = %item_type, "record tombstoned");
        Ok(entry.id)
    }

    async fn approve_claimed(
        &self,
        request: &DeletionRequest,
        caller: &Actor,
        now: DateTime<Utc>,
    ) -> Result<DocId> {
        let target = self
            .store
            .get(request.item_type.collection(), request.item_id)
            .await?
            .ok_or_else(|| {
                GateError::not_found(format!("{} {}", request.item_type, request.item_id))
            })?;
        if target.get("deleted") == Some(&json!(true)) {
            return Err(GateError::invalid_state(format!(
                "{} {} is already deleted",
                request.item_type, request.item_id
            )));
        }
        self.tombstone_and_log(
            request.item_type,
            request.item_id,
            target,
            &request.reason,
            &caller.user_id,
            now,
        )
        .await
    }
}
