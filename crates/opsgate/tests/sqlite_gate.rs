//! The full gate over the SQLite backend.
//!
//! The workflow suites run on the memory store; this one proves the same
//! semantics hold against the persistent backend, including across a
//! close-and-reopen.

use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde_json::json;

use opsgate::{
    DeletionOutcome, DocId, DocumentStore, Gate, GateConfig, ItemType, Role, SqliteStore, UserId,
};
use opsgate_testkit::ManualClock;

fn tuesday() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap()
}

fn gate_over(store: Arc<SqliteStore>) -> Gate<SqliteStore> {
    Gate::with_clock(
        store,
        GateConfig::default(),
        Arc::new(ManualClock::at(tuesday())),
    )
}

#[tokio::test]
async fn test_direct_delete_and_restore_on_sqlite() -> Result<()> {
    let store = Arc::new(SqliteStore::open_memory()?);
    let gate = gate_over(Arc::clone(&store));
    let admin = opsgate::Actor::new(UserId::new("admin-1"), Role::Admin);

    let bill_id = DocId::generate();
    store
        .insert(
            ItemType::Bill.collection(),
            bill_id,
            &json!({"amount": 125_00, "customer": "acme"}),
        )
        .await?;

    let secret = gate.ensure_or_get_credential(&admin).await?.plaintext;
    let log_id = match gate
        .request_deletion("bill", bill_id, "duplicate", &admin, &secret, None)
        .await?
    {
        DeletionOutcome::Deleted { log_id } => log_id,
        other => panic!("expected a direct delete, got {other:?}"),
    };

    let body = store
        .get(ItemType::Bill.collection(), bill_id)
        .await?
        .expect("tombstoned, not removed");
    assert_eq!(body["deleted"], json!(true));

    let restored = gate.restore_deleted(log_id, &admin, &secret, None).await?;
    assert_eq!(restored, bill_id);
    let body = store
        .get(ItemType::Bill.collection(), bill_id)
        .await?
        .expect("revived");
    assert!(body.get("deleted").is_none());
    Ok(())
}

#[tokio::test]
async fn test_credential_survives_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("opsgate.db");
    let admin = opsgate::Actor::new(UserId::new("admin-1"), Role::Admin);

    let secret = {
        let gate = gate_over(Arc::new(SqliteStore::open(&path)?));
        gate.ensure_or_get_credential(&admin).await?.plaintext
    };

    // A fresh process sees the same week's credential, not a new one.
    let gate = gate_over(Arc::new(SqliteStore::open(&path)?));
    let handout = gate.ensure_or_get_credential(&admin).await?;
    assert_eq!(handout.plaintext, secret);
    assert!(gate.validate_credential(&secret).await?.valid);
    Ok(())
}
