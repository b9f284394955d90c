//! In-memory implementation of the DocumentStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite but
//! keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use opsgate_core::DocId;

use crate::error::Result;
use crate::filter::{Filter, Patch};
use crate::traits::{Document, DocumentStore, InsertOutcome};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock;
/// every trait method takes the lock once, so guard-check-then-write is
/// atomic exactly as in the SQLite backend.
pub struct MemoryStore {
    inner: RwLock<HashMap<String, Collection>>,
}

#[derive(Default)]
struct Collection {
    /// Documents by id, ordered for deterministic iteration.
    docs: BTreeMap<DocId, Value>,
    /// Uniqueness keys: key -> holding document.
    unique: HashMap<String, DocId>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn release_key_of(collection: &mut Collection, id: DocId) {
    collection.unique.retain(|_, holder| *holder != id);
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, id: DocId, body: &Value) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let coll = inner.entry(collection.to_string()).or_default();
        coll.docs.insert(id, body.clone());
        Ok(())
    }

    async fn insert_unique(
        &self,
        collection: &str,
        key: &str,
        id: DocId,
        body: &Value,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().unwrap();
        let coll = inner.entry(collection.to_string()).or_default();

        if let Some(&existing) = coll.unique.get(key) {
            return Ok(InsertOutcome::UniqueConflict { existing });
        }

        coll.unique.insert(key.to_string(), id);
        coll.docs.insert(id, body.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, collection: &str, id: DocId) -> Result<Option<Value>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .get(collection)
            .and_then(|coll| coll.docs.get(&id).cloned()))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let inner = self.inner.read().unwrap();
        let Some(coll) = inner.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .docs
            .iter()
            .filter(|(_, body)| filter.matches(body))
            .map(|(&id, body)| Document {
                id,
                body: body.clone(),
            })
            .collect())
    }

    async fn update(&self, collection: &str, id: DocId, patch: &Patch) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let Some(coll) = inner.get_mut(collection) else {
            return Ok(false);
        };
        let Some(body) = coll.docs.get_mut(&id) else {
            return Ok(false);
        };
        patch.apply(body);
        if patch.releases_unique_key() {
            release_key_of(coll, id);
        }
        Ok(true)
    }

    async fn update_if(
        &self,
        collection: &str,
        id: DocId,
        guard: &Filter,
        patch: &Patch,
    ) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let Some(coll) = inner.get_mut(collection) else {
            return Ok(false);
        };
        let Some(body) = coll.docs.get_mut(&id) else {
            return Ok(false);
        };
        if !guard.matches(body) {
            return Ok(false);
        }
        patch.apply(body);
        if patch.releases_unique_key() {
            release_key_of(coll, id);
        }
        Ok(true)
    }

    async fn update_where(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let Some(coll) = inner.get_mut(collection) else {
            return Ok(0);
        };
        let matched: Vec<DocId> = coll
            .docs
            .iter()
            .filter(|(_, body)| filter.matches(body))
            .map(|(&id, _)| id)
            .collect();
        for id in &matched {
            if let Some(body) = coll.docs.get_mut(id) {
                patch.apply(body);
            }
            if patch.releases_unique_key() {
                release_key_of(coll, *id);
            }
        }
        Ok(matched.len() as u64)
    }

    async fn remove(&self, collection: &str, id: DocId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let Some(coll) = inner.get_mut(collection) else {
            return Ok(false);
        };
        let removed = coll.docs.remove(&id).is_some();
        if removed {
            release_key_of(coll, id);
        }
        Ok(removed)
    }
}
