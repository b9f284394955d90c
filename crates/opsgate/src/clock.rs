//! Time source injection.
//!
//! Credential expiry is wall-clock sensitive, so the gate reads time through
//! a trait. Production uses [`SystemClock`]; tests pin or advance a manual
//! clock to cross week boundaries without sleeping.

use chrono::{DateTime, Utc};

/// A source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
