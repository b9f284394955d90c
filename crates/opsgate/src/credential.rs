//! The credential manager: weekly step-up secret issuance, validation, and
//! the usage ledger.
//!
//! Issuance is linearizable per week: the active credential row holds its
//! week id as a store uniqueness key, so concurrent issuers race on one
//! insert and every loser adopts the winner. Expiry is enforced here at
//! validation time; nothing sweeps expired rows in the background.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use opsgate_core::{
    generate_secret, is_well_formed, week_end, CoreError, Credential, DocId, RequestProvenance,
    SecretHash, UsageRecord, UsageStats, UserId, WeekId,
};
use opsgate_store::{DocumentStore, Filter, InsertOutcome, Patch};

use crate::codec::{decode, encode};
use crate::collections;
use crate::error::{GateError, Result};

/// The one user-visible reason for any credential mismatch. Wrong, expired,
/// and superseded secrets are deliberately indistinguishable.
const INVALID_CREDENTIAL: &str = "invalid or expired credential";

/// One consumption of the credential, destined for the usage ledger.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub credential_id: DocId,
    pub user_id: UserId,
    pub action: String,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
    pub metadata: Option<Value>,
    pub provenance: Option<RequestProvenance>,
}

/// Issues, validates, and rotates the weekly secret, and owns the
/// append-only usage ledger.
pub struct CredentialManager<S> {
    store: Arc<S>,
    secret_len: usize,
}

impl<S> Clone for CredentialManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            secret_len: self.secret_len,
        }
    }
}

impl<S: DocumentStore> CredentialManager<S> {
    pub(crate) fn new(store: Arc<S>, secret_len: usize) -> Self {
        Self { store, secret_len }
    }

    /// Return the active, unexpired credential, issuing one if the week has
    /// none yet. Idempotent and safe under concurrent callers: racers
    /// converge on a single credential for the week.
    pub async fn ensure_active(&self, now: DateTime<Utc>) -> Result<Credential> {
        let actives = self.read_active().await?;
        if let Some(current) = actives.iter().find(|c| c.is_unexpired(now)) {
            return Ok(current.clone());
        }
        // Demote expired leftovers by id, never by blanket filter: a racer
        // may already have activated this week's credential and a blanket
        // demotion would knock it out.
        for stale in &actives {
            self.demote(stale.id).await?;
        }
        self.claim_week(now).await
    }

    /// Issue a credential. With `force` false this is [`Self::ensure_active`];
    /// with `force` true the current secret is always superseded.
    pub async fn generate(&self, force: bool, now: DateTime<Utc>) -> Result<Credential> {
        if !force {
            return self.ensure_active(now).await;
        }

        // Deactivate-then-claim, retried once if an issuer slips between
        // our demotion and our insert.
        for _ in 0..2 {
            for active in &self.read_active().await? {
                self.demote(active.id).await?;
            }
            let fresh = self.mint(now);
            match self
                .store
                .insert_unique(
                    collections::CREDENTIALS,
                    fresh.week_id.as_str(),
                    fresh.id,
                    &encode(&fresh)?,
                )
                .await?
            {
                InsertOutcome::Inserted => {
                    tracing::info!(week = %fresh.week_id, "force-rotated credential");
                    return Ok(fresh);
                }
                InsertOutcome::UniqueConflict { existing } => {
                    tracing::warn!(
                        week = %fresh.week_id,
                        existing = %existing,
                        "credential rotation raced an issuer, retrying"
                    );
                }
            }
        }

        // Two losses in a row: adopt whatever won. The caller still gets a
        // freshly rotated secret, just not the one minted here.
        match self
            .read_active()
            .await?
            .into_iter()
            .find(|c| c.is_unexpired(now))
        {
            Some(winner) => Ok(winner),
            None => Err(GateError::Conflict(
                "credential rotation raced and no active credential emerged".into(),
            )),
        }
    }

    /// Check a plaintext secret against the active credential.
    ///
    /// Ensures the week's credential exists first, so validation never fails
    /// merely because nobody asked for the secret yet this week. Malformed
    /// input fails fast as a validation error; any other mismatch is a
    /// generic unauthorized.
    pub async fn validate(&self, secret: &str, now: DateTime<Utc>) -> Result<DocId> {
        let active = self.ensure_active(now).await?;

        if !is_well_formed(secret, self.secret_len) {
            return Err(CoreError::MalformedSecret {
                expected: self.secret_len,
            }
            .into());
        }

        if active.is_unexpired(now) && active.secret_hash == SecretHash::of(secret) {
            Ok(active.id)
        } else {
            tracing::warn!("credential validation failed");
            Err(GateError::unauthorized(INVALID_CREDENTIAL))
        }
    }

    /// Append a usage record and bump the credential's counters.
    ///
    /// Side-effect only: never affects validity, and a missing credential
    /// row does not suppress the ledger entry.
    pub async fn record_usage(&self, event: UsageEvent, now: DateTime<Utc>) -> Result<UsageRecord> {
        let record = UsageRecord {
            id: DocId::generate(),
            credential_id: event.credential_id,
            user_id: event.user_id,
            action: event.action,
            target_id: event.target_id,
            target_type: event.target_type,
            metadata: event.metadata,
            provenance: event.provenance,
            recorded_at: now,
        };
        self.store
            .insert(collections::CREDENTIAL_USAGE, record.id, &encode(&record)?)
            .await?;

        match self
            .store
            .get(collections::CREDENTIALS, record.credential_id)
            .await?
        {
            Some(body) => {
                let credential: Credential = decode(collections::CREDENTIALS, body)?;
                let bump = Patch::new()
                    .set("usage_count", json!(credential.usage_count + 1))
                    .set("last_used_at", encode(&now)?);
                self.store
                    .update(collections::CREDENTIALS, credential.id, &bump)
                    .await?;
            }
            None => {
                tracing::warn!(
                    credential_id = %record.credential_id,
                    "usage recorded against a credential row that no longer exists"
                );
            }
        }

        tracing::debug!(action = %record.action, user = %record.user_id, "credential usage recorded");
        Ok(record)
    }

    /// Aggregate the usage ledger over a trailing window.
    pub async fn stats(&self, window_days: u32, now: DateTime<Utc>) -> Result<UsageStats> {
        let cutoff = now - Duration::days(i64::from(window_days));
        let docs = self
            .store
            .find(collections::CREDENTIAL_USAGE, &Filter::all())
            .await?;
        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            let record: UsageRecord = decode(collections::CREDENTIAL_USAGE, doc.body)?;
            if record.recorded_at >= cutoff && record.recorded_at <= now {
                records.push(record);
            }
        }
        Ok(UsageStats::aggregate(window_days, &records))
    }

    async fn read_active(&self) -> Result<Vec<Credential>> {
        let docs = self
            .store
            .find(
                collections::CREDENTIALS,
                &Filter::all().eq("is_active", json!(true)),
            )
            .await?;
        docs.into_iter()
            .map(|doc| decode(collections::CREDENTIALS, doc.body))
            .collect()
    }

    async fn demote(&self, id: DocId) -> Result<()> {
        let patch = Patch::new()
            .set("is_active", json!(false))
            .release_unique_key();
        self.store
            .update(collections::CREDENTIALS, id, &patch)
            .await?;
        Ok(())
    }

    /// Insert a freshly minted credential for the current week; on a
    /// uniqueness conflict, adopt the winner instead of erroring.
    async fn claim_week(&self, now: DateTime<Utc>) -> Result<Credential> {
        let fresh = self.mint(now);
        match self
            .store
            .insert_unique(
                collections::CREDENTIALS,
                fresh.week_id.as_str(),
                fresh.id,
                &encode(&fresh)?,
            )
            .await?
        {
            InsertOutcome::Inserted => {
                tracing::info!(week = %fresh.week_id, "issued credential for the week");
                Ok(fresh)
            }
            InsertOutcome::UniqueConflict { existing } => {
                tracing::debug!(existing = %existing, "credential issuance lost the race, adopting winner");
                self.read_active()
                    .await?
                    .into_iter()
                    .find(|c| c.is_unexpired(now))
                    .ok_or_else(|| {
                        GateError::Conflict(
                            "credential issuance raced and no active credential emerged".into(),
                        )
                    })
            }
        }
    }

    fn mint(&self, now: DateTime<Utc>) -> Credential {
        let plaintext = generate_secret(self.secret_len);
        Credential {
            id: DocId::generate(),
            week_id: WeekId::for_instant(now),
            secret_hash: SecretHash::of(&plaintext),
            secret_plaintext: plaintext,
            created_at: now,
            expires_at: week_end(now),
            is_active: true,
            usage_count: 0,
            last_used_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use opsgate_core::SECRET_LEN;
    use opsgate_store::MemoryStore;

    fn manager() -> CredentialManager<MemoryStore> {
        CredentialManager::new(Arc::new(MemoryStore::new()), SECRET_LEN)
    }

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 0, 1, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_active_is_idempotent() {
        let mgr = manager();
        let first = mgr.ensure_active(monday()).await.unwrap();
        let second = mgr.ensure_active(monday()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.secret_plaintext, second.secret_plaintext);
    }

    #[tokio::test]
    async fn test_force_rotate_supersedes_previous() {
        let mgr = manager();
        let first = mgr.ensure_active(monday()).await.unwrap();
        let rotated = mgr.generate(true, monday()).await.unwrap();
        assert_ne!(first.id, rotated.id);

        // Exactly one active credential remains, and it is the new one.
        let actives = mgr.read_active().await.unwrap();
        assert_eq!(actives.len(), 1);
        assert_eq!(actives[0].id, rotated.id);

        // The superseded secret no longer validates.
        let err = mgr.validate(&first.secret_plaintext, monday()).await;
        assert!(matches!(err, Err(GateError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_generate_without_force_returns_current() {
        let mgr = manager();
        let first = mgr.ensure_active(monday()).await.unwrap();
        let same = mgr.generate(false, monday()).await.unwrap();
        assert_eq!(first.id, same.id);
    }

    #[tokio::test]
    async fn test_validate_accepts_only_the_active_secret() {
        let mgr = manager();
        let cred = mgr.ensure_active(monday()).await.unwrap();

        let id = mgr.validate(&cred.secret_plaintext, monday()).await.unwrap();
        assert_eq!(id, cred.id);

        let wrong = if cred.secret_plaintext == "000000" {
            "000001"
        } else {
            "000000"
        };
        assert!(matches!(
            mgr.validate(wrong, monday()).await,
            Err(GateError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_rejects_malformed_input_as_validation() {
        let mgr = manager();
        for bad in ["12345", "1234567", "12a456", ""] {
            assert!(matches!(
                mgr.validate(bad, monday()).await,
                Err(GateError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_credential_expires_at_week_boundary() {
        let mgr = manager();
        let cred = mgr.ensure_active(monday()).await.unwrap();

        // Sunday 23:59:59 of the same week: still valid.
        let sunday_night = Utc.with_ymd_and_hms(2026, 8, 30, 23, 59, 59).unwrap();
        assert!(mgr
            .validate(&cred.secret_plaintext, sunday_night)
            .await
            .is_ok());

        // Monday 00:00:01 of the next week: expired, and a fresh ensure
        // issues a distinct code.
        let next_monday = Utc.with_ymd_and_hms(2026, 8, 31, 0, 0, 1).unwrap();
        assert!(matches!(
            mgr.validate(&cred.secret_plaintext, next_monday).await,
            Err(GateError::Unauthorized(_))
        ));
        let next = mgr.ensure_active(next_monday).await.unwrap();
        assert_ne!(next.id, cred.id);
        assert_ne!(next.week_id, cred.week_id);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_converges_on_one_credential() {
        let mgr = manager();
        let now = monday();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move { mgr.ensure_active(now).await }));
        }
        let mut plaintexts = std::collections::BTreeSet::new();
        for handle in handles {
            plaintexts.insert(handle.await.unwrap().unwrap().secret_plaintext);
        }
        assert_eq!(plaintexts.len(), 1, "racers must adopt a single winner");
        assert_eq!(mgr.read_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_usage_updates_ledger_and_counters() {
        let mgr = manager();
        let cred = mgr.ensure_active(monday()).await.unwrap();

        mgr.record_usage(
            UsageEvent {
                credential_id: cred.id,
                user_id: UserId::new("admin-1"),
                action: "direct_delete".into(),
                target_id: Some("bill-9".into()),
                target_type: Some("bill".into()),
                metadata: None,
                provenance: Some(RequestProvenance {
                    remote_addr: Some("203.0.113.9".into()),
                    client_id: None,
                }),
            },
            monday(),
        )
        .await
        .unwrap();

        let refreshed = mgr.ensure_active(monday()).await.unwrap();
        assert_eq!(refreshed.usage_count, 1);
        assert_eq!(refreshed.last_used_at, Some(monday()));

        let stats = mgr.stats(7, monday()).await.unwrap();
        assert_eq!(stats.total_usage, 1);
        assert_eq!(stats.per_action["direct_delete"], 1);
        assert_eq!(stats.per_user["admin-1"], 1);
    }

    #[tokio::test]
    async fn test_stats_window_excludes_old_usage() {
        let mgr = manager();
        let cred = mgr.ensure_active(monday()).await.unwrap();
        let event = |action: &str| UsageEvent {
            credential_id: cred.id,
            user_id: UserId::new("admin-1"),
            action: action.into(),
            target_id: None,
            target_type: None,
            metadata: None,
            provenance: None,
        };

        mgr.record_usage(event("old"), monday() - Duration::days(30))
            .await
            .unwrap();
        mgr.record_usage(event("recent"), monday()).await.unwrap();

        let stats = mgr.stats(7, monday()).await.unwrap();
        assert_eq!(stats.total_usage, 1);
        assert!(stats.per_action.contains_key("recent"));
        assert!(!stats.per_action.contains_key("old"));
    }
}
