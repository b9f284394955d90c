//! Filters and patches over JSON document bodies.
//!
//! Deliberately small: top-level field equality and field absence cover
//! every query the workflows make. Both backends evaluate filters through
//! [`Filter::matches`] so they cannot drift apart.

use serde_json::{Map, Value};

/// One filter clause over a top-level document field.
#[derive(Debug, Clone, PartialEq)]
enum Clause {
    /// Field present and equal to the value.
    Eq(String, Value),
    /// Field absent or JSON null. Tombstone flags are removed on restore,
    /// so "absent" and "never set" are the same state.
    Absent(String),
}

/// A conjunction of clauses over top-level document fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// The filter matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value));
        self
    }

    /// Require `field` to be absent (or null).
    pub fn absent(mut self, field: impl Into<String>) -> Self {
        self.clauses.push(Clause::Absent(field.into()));
        self
    }

    /// Evaluate this filter against a document body.
    ///
    /// Non-object bodies match only the empty filter.
    pub fn matches(&self, body: &Value) -> bool {
        let Some(obj) = body.as_object() else {
            return self.clauses.is_empty();
        };
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(field, value) => obj.get(field) == Some(value),
            Clause::Absent(field) => matches!(obj.get(field), None | Some(Value::Null)),
        })
    }
}

/// A partial update: fields to set and fields to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    set: Vec<(String, Value)>,
    unset: Vec<String>,
    release_key: bool,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value` (inserting or overwriting).
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.push((field.into(), value));
        self
    }

    /// Remove `field` entirely, `$unset`-style.
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Release the document's uniqueness key, if it holds one.
    ///
    /// Used when demoting the active credential so a successor can claim
    /// the same key.
    pub fn release_unique_key(mut self) -> Self {
        self.release_key = true;
        self
    }

    /// Whether this patch releases the document's uniqueness key.
    pub fn releases_unique_key(&self) -> bool {
        self.release_key
    }

    /// Apply this patch to a document body in place.
    pub fn apply(&self, body: &mut Value) {
        if !body.is_object() {
            *body = Value::Object(Map::new());
        }
        let obj = body.as_object_mut().expect("body coerced to object above");
        for (field, value) in &self.set {
            obj.insert(field.clone(), value.clone());
        }
        for field in &self.unset {
            obj.remove(field);
        }
    }
}
