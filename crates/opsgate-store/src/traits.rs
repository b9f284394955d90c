//! Store trait: the abstract interface for document persistence.
//!
//! This trait keeps the workflows storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde_json::Value;

use opsgate_core::DocId;

use crate::error::Result;
use crate::filter::{Filter, Patch};

/// Result of inserting a document under a uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Document was inserted and now holds the key.
    Inserted,
    /// Another document already holds the key. The caller lost the race
    /// and should re-read the winner rather than erroring.
    UniqueConflict {
        /// The document currently holding the key.
        existing: DocId,
    },
}

/// A document returned from a read: its id plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocId,
    pub body: Value,
}

/// The DocumentStore trait: async interface for collection-scoped records.
///
/// # Design Notes
///
/// - **Guarded updates**: `update_if` re-checks a filter against the current
///   body atomically with the write. This is the primitive behind every
///   pending→terminal transition; the loser of a race observes `false`.
/// - **Uniqueness keys**: at most one document per collection holds a given
///   key. `insert_unique` claims a key; a patch built with
///   [`Patch::release_unique_key`] releases it. The active credential row
///   holds its week id as key.
/// - **No cross-call caching**: every operation reads current state; the
///   store is the only shared mutable resource in the system.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. The id must not already exist in the collection.
    async fn insert(&self, collection: &str, id: DocId, body: &Value) -> Result<()>;

    /// Insert a document that claims a uniqueness key.
    async fn insert_unique(
        &self,
        collection: &str,
        key: &str,
        id: DocId,
        body: &Value,
    ) -> Result<InsertOutcome>;

    /// Fetch one document by id.
    async fn get(&self, collection: &str, id: DocId) -> Result<Option<Value>>;

    /// Fetch every document matching the filter.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    /// Patch one document by id. Returns `false` if the id is absent.
    async fn update(&self, collection: &str, id: DocId, patch: &Patch) -> Result<bool>;

    /// Patch one document only if it currently matches the guard.
    ///
    /// The guard check and the write are atomic with respect to every other
    /// store operation. Returns `false` when the document is absent or the
    /// guard no longer matches.
    async fn update_if(
        &self,
        collection: &str,
        id: DocId,
        guard: &Filter,
        patch: &Patch,
    ) -> Result<bool>;

    /// Patch every document matching the filter. Returns the count patched.
    async fn update_where(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<u64>;

    /// Remove one document by id. Returns `false` if the id was absent.
    async fn remove(&self, collection: &str, id: DocId) -> Result<bool>;
}
