//! The approval workflow: create, list, and resolve queued privileged
//! actions.
//!
//! Resolution is the only path out of `pending`, and it is guarded by a
//! compare-and-set on the stored status: when two resolvers race, exactly
//! one wins and the other observes an invalid-state error.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use opsgate_core::{ApprovalRequest, ApprovalStatus, ApprovalType, Decision, DocId};
use opsgate_perms::{approve_capability, is_allowed, request_capability, Actor, Role};
use opsgate_store::{DocumentStore, Filter, Patch};

use crate::codec::{decode, encode};
use crate::collections;
use crate::error::{GateError, Result};

/// A no-op approval side-effect, for request kinds whose effect is applied
/// by the caller after the fact.
pub async fn no_side_effect(_request: ApprovalRequest) -> Result<()> {
    Ok(())
}

/// Owns the [`ApprovalRequest`] lifecycle.
pub struct ApprovalWorkflow<S> {
    store: Arc<S>,
}

impl<S> Clone for ApprovalWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> ApprovalWorkflow<S> {
    pub(crate) fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// File a new request, rejecting requesters whose role lacks the
    /// "request" capability for this kind.
    pub async fn create(
        &self,
        kind: ApprovalType,
        job_id: impl Into<String>,
        requester: &Actor,
        request_data: Value,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest> {
        if !is_allowed(requester.role, request_capability(kind)) {
            return Err(GateError::unauthorized(format!(
                "role {} may not request {} approvals",
                requester.role, kind
            )));
        }

        let request = ApprovalRequest {
            id: DocId::generate(),
            kind,
            job_id: job_id.into(),
            requested_by: requester.user_id.clone(),
            request_data,
            metadata,
            status: ApprovalStatus::Pending,
            created_at: now,
            resolved_by: None,
            resolved_at: None,
            rejection_reason: None,
        };
        self.store
            .insert(collections::APPROVAL_REQUESTS, request.id, &encode(&request)?)
            .await?;
        tracing::info!(id = %request.id, kind = %kind, requester = %requester.user_id, "approval request filed");
        Ok(request)
    }

    /// List requests, newest first.
    ///
    /// Staff callers only ever see their own requests, regardless of the
    /// filters supplied. That narrowing happens here, server-side: it is a
    /// security boundary, not a display convenience.
    pub async fn list(
        &self,
        caller: &Actor,
        status: Option<ApprovalStatus>,
        kind: Option<ApprovalType>,
    ) -> Result<Vec<ApprovalRequest>> {
        let mut filter = Filter::all();
        if let Some(status) = status {
            filter = filter.eq("status", json!(status.as_str()));
        }
        if let Some(kind) = kind {
            filter = filter.eq("kind", json!(kind.as_str()));
        }

        let docs = self
            .store
            .find(collections::APPROVAL_REQUESTS, &filter)
            .await?;
        let mut requests = Vec::with_capacity(docs.len());
        for doc in docs {
            requests.push(decode::<ApprovalRequest>(
                collections::APPROVAL_REQUESTS,
                doc.body,
            )?);
        }

        if caller.role == Role::Staff {
            requests.retain(|r| r.requested_by == caller.user_id);
        }

        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Resolve a pending request.
    ///
    /// On approve, `on_approve` runs before the status flip; if it fails,
    /// the request stays `pending` and the error propagates. The flip
    /// itself is a compare-and-set on `pending`, so the loser of a
    /// concurrent resolution observes [`GateError::InvalidState`]. The
    /// side-effect must therefore be safe to retry.
    pub async fn resolve<F, Fut>(
        &self,
        request_id: DocId,
        resolver: &Actor,
        decision: Decision,
        rejection_reason: Option<String>,
        on_approve: F,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest>
    where
        F: FnOnce(ApprovalRequest) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let body = self
            .store
            .get(collections::APPROVAL_REQUESTS, request_id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("approval request {request_id}")))?;
        let request: ApprovalRequest = decode(collections::APPROVAL_REQUESTS, body)?;

        if !is_allowed(resolver.role, approve_capability(request.kind)) {
            return Err(GateError::unauthorized(format!(
                "role {} may not resolve {} approvals",
                resolver.role, request.kind
            )));
        }
        if request.status.is_terminal() {
            return Err(GateError::invalid_state(format!(
                "approval request {request_id} is already {}",
                request.status.as_str()
            )));
        }

        let pending = Filter::all().eq("status", json!(ApprovalStatus::Pending.as_str()));
        match decision {
            Decision::Approve => {
                on_approve(request.clone()).await?;

                let patch = Patch::new()
                    .set("status", json!(ApprovalStatus::Approved.as_str()))
                    .set("resolved_by", json!(resolver.user_id.as_str()))
                    .set("resolved_at", encode(&now)?);
                if !self
                    .store
                    .update_if(collections::APPROVAL_REQUESTS, request_id, &pending, &patch)
                    .await?
                {
                    return Err(GateError::invalid_state(format!(
                        "approval request {request_id} was resolved concurrently"
                    )));
                }
                tracing::info!(id = %request_id, resolver = %resolver.user_id, "approval request approved");
            }
            Decision::Reject => {
                let mut patch = Patch::new()
                    .set("status", json!(ApprovalStatus::Rejected.as_str()))
                    .set("resolved_by", json!(resolver.user_id.as_str()))
                    .set("resolved_at", encode(&now)?);
                if let Some(reason) = &rejection_reason {
                    patch = patch.set("rejection_reason", json!(reason));
                }
                if !self
                    .store
                    .update_if(collections::APPROVAL_REQUESTS, request_id, &pending, &patch)
                    .await?
                {
                    return Err(GateError::invalid_state(format!(
                        "approval request {request_id} was resolved concurrently"
                    )));
                }
                tracing::info!(id = %request_id, resolver = %resolver.user_id, "approval request rejected");
            }
        }

        let body = self
            .store
            .get(collections::APPROVAL_REQUESTS, request_id)
            .await?
            .ok_or_else(|| GateError::not_found(format!("approval request {request_id}")))?;
        decode(collections::APPROVAL_REQUESTS, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use opsgate_core::UserId;
    use opsgate_store::MemoryStore;

    fn workflow() -> ApprovalWorkflow<MemoryStore> {
        ApprovalWorkflow::new(Arc::new(MemoryStore::new()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap()
    }

    fn staff(name: &str) -> Actor {
        Actor::new(UserId::new(name), Role::Staff)
    }

    fn manager(name: &str) -> Actor {
        Actor::new(UserId::new(name), Role::Manager)
    }

    async fn file_part_request(wf: &ApprovalWorkflow<MemoryStore>, who: &Actor) -> ApprovalRequest {
        wf.create(
            ApprovalType::Part,
            "job-42",
            who,
            json!({"part": "alternator"}),
            json!({"summary": "alternator for job 42"}),
            now(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_requires_request_capability() {
        let wf = workflow();
        let err = wf
            .create(
                ApprovalType::Payment,
                "job-42",
                &staff("staff-a"),
                json!({}),
                json!({}),
                now(),
            )
            .await;
        assert!(matches!(err, Err(GateError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_staff_only_see_their_own_requests() {
        let wf = workflow();
        let a = staff("staff-a");
        let b = staff("staff-b");
        let filed = file_part_request(&wf, &a).await;

        let seen_by_b = wf.list(&b, Some(ApprovalStatus::Pending), None).await.unwrap();
        assert!(seen_by_b.is_empty(), "staff B must not see A's request");

        let seen_by_a = wf.list(&a, Some(ApprovalStatus::Pending), None).await.unwrap();
        assert_eq!(seen_by_a.len(), 1);

        let seen_by_manager = wf
            .list(&manager("mgr-c"), Some(ApprovalStatus::Pending), None)
            .await
            .unwrap();
        assert_eq!(seen_by_manager.len(), 1);
        assert_eq!(seen_by_manager[0].id, filed.id);
    }

    #[tokio::test]
    async fn test_approve_runs_side_effect_then_flips() {
        let wf = workflow();
        let filed = file_part_request(&wf, &staff("staff-a")).await;

        let resolved = wf
            .resolve(
                filed.id,
                &manager("mgr-c"),
                Decision::Approve,
                None,
                |request| async move {
                    assert_eq!(request.kind, ApprovalType::Part);
                    Ok(())
                },
                now(),
            )
            .await
            .unwrap();
        assert_eq!(resolved.status, ApprovalStatus::Approved);
        assert_eq!(resolved.resolved_by, Some(UserId::new("mgr-c")));
        assert!(resolved.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_side_effect_leaves_request_pending() {
        let wf = workflow();
        let filed = file_part_request(&wf, &staff("staff-a")).await;

        let err = wf
            .resolve(
                filed.id,
                &manager("mgr-c"),
                Decision::Approve,
                None,
                |_request| async move {
                    Err(GateError::Validation("subtask payload malformed".into()))
                },
                now(),
            )
            .await;
        assert!(matches!(err, Err(GateError::Validation(_))));

        let still_pending = wf
            .list(&manager("mgr-c"), Some(ApprovalStatus::Pending), None)
            .await
            .unwrap();
        assert_eq!(still_pending.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_requires_approve_capability() {
        let wf = workflow();
        let filed = file_part_request(&wf, &staff("staff-a")).await;

        let err = wf
            .resolve(
                filed.id,
                &staff("staff-b"),
                Decision::Approve,
                None,
                no_side_effect,
                now(),
            )
            .await;
        assert!(matches!(err, Err(GateError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_terminal_requests_do_not_transition() {
        let wf = workflow();
        let filed = file_part_request(&wf, &staff("staff-a")).await;
        let mgr = manager("mgr-c");

        wf.resolve(
            filed.id,
            &mgr,
            Decision::Reject,
            Some("not needed".into()),
            no_side_effect,
            now(),
        )
        .await
        .unwrap();

        let err = wf
            .resolve(filed.id, &mgr, Decision::Approve, None, no_side_effect, now())
            .await;
        assert!(matches!(err, Err(GateError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_missing_request_is_not_found() {
        let wf = workflow();
        let err = wf
            .resolve(
                DocId::generate(),
                &manager("mgr-c"),
                Decision::Approve,
                None,
                no_side_effect,
                now(),
            )
            .await;
        assert!(matches!(err, Err(GateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_resolution_has_one_winner() {
        let wf = workflow();
        let filed = file_part_request(&wf, &staff("staff-a")).await;
        let mgr = manager("mgr-c");

        let first = {
            let wf = wf.clone();
            let mgr = mgr.clone();
            tokio::spawn(async move {
                wf.resolve(filed.id, &mgr, Decision::Approve, None, no_side_effect, now())
                    .await
            })
        };
        let second = {
            let wf = wf.clone();
            let mgr = mgr.clone();
            tokio::spawn(async move {
                wf.resolve(filed.id, &mgr, Decision::Approve, None, no_side_effect, now())
                    .await
            })
        };

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one resolver must win: {outcomes:?}");
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(GateError::InvalidState(_)))));
    }
}
