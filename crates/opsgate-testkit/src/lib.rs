//! # Opsgate Testkit
//!
//! Testing utilities for opsgate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a fully wired [`Gate`](opsgate::Gate) over the memory
//!   store, with one actor per role, seeded target records, and a manual
//!   clock that can jump across week boundaries
//! - **Generators**: proptest strategies for roles, capabilities, secrets,
//!   and item types
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use opsgate_testkit::fixtures::WorkflowFixture;
//!
//! let fx = WorkflowFixture::new().await;
//! let secret = fx.credential().await;
//! fx.clock.advance_days(7);   // next week: the secret above is now stale
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{ManualClock, WorkflowFixture};
