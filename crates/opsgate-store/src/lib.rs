//! # Opsgate Store
//!
//! The document-store abstraction backing the opsgate workflows: a
//! collection-scoped key-value store with filtered reads, patched writes,
//! guarded (compare-and-set) updates, and uniqueness keys.
//!
//! Two backends share the same semantics:
//!
//! - [`MemoryStore`] - in-process, for tests
//! - [`SqliteStore`] - the persistent backend (rusqlite, bundled)
//!
//! The workflows never assume more from the store than this trait offers;
//! referential integrity across collections is enforced by the callers.

pub mod error;
pub mod filter;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use filter::{Filter, Patch};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Document, DocumentStore, InsertOutcome};
