//! # Opsgate Perms
//!
//! The permission matrix: a pure, total function from (role, capability) to
//! an authorization decision. No I/O, no state, no panics.
//!
//! Role and action checks are never string comparisons scattered across
//! handlers; every policy question flows through [`is_allowed`] so the
//! matrix is exhaustive and unit-testable in isolation from transport code.

pub mod actor;
pub mod matrix;

pub use actor::Actor;
pub use matrix::{approve_capability, is_allowed, request_capability, Capability, Role, UnknownRole};
