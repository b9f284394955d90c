//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use opsgate::{Actor, DocId, Gate, GateConfig, ItemType, Role, UserId};
use opsgate_store::{DocumentStore, MemoryStore};

/// A clock tests drive by hand.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl opsgate::Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A fully wired gate over the memory store: one actor per role, one seeded
/// record per deletable type, and a manual clock pinned to a Tuesday.
pub struct WorkflowFixture {
    pub gate: Gate<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub admin: Actor,
    pub manager: Actor,
    pub staff: Actor,
    pub job_id: DocId,
    pub bill_id: DocId,
    pub payment_id: DocId,
}

impl WorkflowFixture {
    /// Tuesday 2026-08-25 10:00 UTC, comfortably inside ISO week 2026-W35.
    pub fn default_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap()
    }

    pub async fn new() -> Self {
        Self::starting_at(Self::default_start()).await
    }

    pub async fn starting_at(start: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(start));
        let gate = Gate::with_clock(
            Arc::clone(&store),
            GateConfig::default(),
            Arc::clone(&clock) as Arc<dyn opsgate::Clock>,
        );

        let job_id = DocId::generate();
        let bill_id = DocId::generate();
        let payment_id = DocId::generate();
        store
            .insert(
                ItemType::Job.collection(),
                job_id,
                &json!({"name": "brake job", "status": "in_progress"}),
            )
            .await
            .expect("seed job");
        store
            .insert(
                ItemType::Bill.collection(),
                bill_id,
                &json!({"amount": 125_00, "customer": "acme"}),
            )
            .await
            .expect("seed bill");
        store
            .insert(
                ItemType::Payment.collection(),
                payment_id,
                &json!({"amount": 50_00, "method": "card"}),
            )
            .await
            .expect("seed payment");

        Self {
            gate,
            clock,
            admin: Actor::new(UserId::new("admin-1"), Role::Admin),
            manager: Actor::new(UserId::new("mgr-1"), Role::Manager),
            staff: Actor::new(UserId::new("staff-1"), Role::Staff),
            job_id,
            bill_id,
            payment_id,
        }
    }

    /// This week's secret, issuing it if needed.
    pub async fn credential(&self) -> String {
        self.gate
            .ensure_or_get_credential(&self.admin)
            .await
            .expect("issue credential")
            .plaintext
    }

    /// A well-formed secret guaranteed not to match the given one.
    pub fn wrong_secret(&self, actual: &str) -> String {
        if actual == "000000" {
            "000001".to_string()
        } else {
            "000000".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_seeds_one_record_per_type() {
        let fx = WorkflowFixture::new().await;
        for (item, id) in [
            (ItemType::Job, fx.job_id),
            (ItemType::Bill, fx.bill_id),
            (ItemType::Payment, fx.payment_id),
        ] {
            assert!(fx
                .gate
                .store()
                .get(item.collection(), id)
                .await
                .unwrap()
                .is_some());
        }
    }

    #[tokio::test]
    async fn test_manual_clock_advances() {
        let fx = WorkflowFixture::new().await;
        let before = opsgate::Clock::now(&*fx.clock);
        fx.clock.advance_days(7);
        assert_eq!(opsgate::Clock::now(&*fx.clock) - before, Duration::days(7));
    }
}
