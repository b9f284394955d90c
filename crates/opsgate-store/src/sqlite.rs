//! SQLite implementation of the DocumentStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite behind a connection mutex; filter and patch evaluation happen in
//! Rust while the mutex is held, so guarded updates are atomic with respect
//! to every other store operation, and uniqueness keys are enforced by a
//! partial unique index inside SQLite itself.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use opsgate_core::DocId;

use crate::error::{Result, StoreError};
use crate::filter::{Filter, Patch};
use crate::migration;
use crate::traits::{Document, DocumentStore, InsertOutcome};

/// SQLite-based store implementation.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute an operation while holding the connection mutex.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                Some(format!("mutex poisoned: {}", e)),
            ))
        })?;
        f(&conn)
    }
}

fn parse_body(collection: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| StoreError::InvalidData {
        collection: collection.to_string(),
        message: e.to_string(),
    })
}

fn parse_doc_id(collection: &str, raw: &str) -> Result<DocId> {
    DocId::from_str(raw).map_err(|e| StoreError::InvalidData {
        collection: collection.to_string(),
        message: e.to_string(),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Select (id, body) rows of one collection and keep those matching the
/// filter. Runs under the connection mutex via `with_conn`.
fn select_matching(
    conn: &Connection,
    collection: &str,
    filter: &Filter,
) -> Result<Vec<(DocId, Value)>> {
    let mut stmt =
        conn.prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![collection], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (raw_id, raw_body) = row?;
        let body = parse_body(collection, &raw_body)?;
        if filter.matches(&body) {
            out.push((parse_doc_id(collection, &raw_id)?, body));
        }
    }
    Ok(out)
}

fn write_body(
    conn: &Connection,
    collection: &str,
    id: DocId,
    body: &Value,
    release_key: bool,
) -> Result<()> {
    let raw = serde_json::to_string(body)?;
    if release_key {
        conn.execute(
            "UPDATE documents SET body = ?1, unique_key = NULL, updated_at = ?2
             WHERE collection = ?3 AND id = ?4",
            params![raw, Utc::now().timestamp_millis(), collection, id.to_string()],
        )?;
    } else {
        conn.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2
             WHERE collection = ?3 AND id = ?4",
            params![raw, Utc::now().timestamp_millis(), collection, id.to_string()],
        )?;
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, collection: &str, id: DocId, body: &Value) -> Result<()> {
        let raw = serde_json::to_string(body)?;
        self.with_conn(|conn| {
            let now = Utc::now().timestamp_millis();
            conn.execute(
                "INSERT INTO documents (collection, id, unique_key, body, created_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, ?4)",
                params![collection, id.to_string(), raw, now],
            )?;
            Ok(())
        })
    }

    async fn insert_unique(
        &self,
        collection: &str,
        key: &str,
        id: DocId,
        body: &Value,
    ) -> Result<InsertOutcome> {
        let raw = serde_json::to_string(body)?;
        self.with_conn(|conn| {
            let now = Utc::now().timestamp_millis();
            let inserted = conn.execute(
                "INSERT INTO documents (collection, id, unique_key, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![collection, id.to_string(), key, raw, now],
            );
            match inserted {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(err) if is_unique_violation(&err) => {
                    // The index rejected us; report the current holder.
                    let existing: Option<String> = conn
                        .query_row(
                            "SELECT id FROM documents
                             WHERE collection = ?1 AND unique_key = ?2",
                            params![collection, key],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match existing {
                        Some(raw_id) => Ok(InsertOutcome::UniqueConflict {
                            existing: parse_doc_id(collection, &raw_id)?,
                        }),
                        // Constraint fired but no holder: the id itself
                        // collided. Surface the original error.
                        None => Err(StoreError::Database(err)),
                    }
                }
                Err(err) => Err(StoreError::Database(err)),
            }
        })
    }

    async fn get(&self, collection: &str, id: DocId) -> Result<Option<Value>> {
        self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|raw| parse_body(collection, &raw)).transpose()
        })
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let rows = select_matching(conn, collection, filter)?;
            Ok(rows
                .into_iter()
                .map(|(id, body)| Document { id, body })
                .collect())
        })
    }

    async fn update(&self, collection: &str, id: DocId, patch: &Patch) -> Result<bool> {
        self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(raw) = raw else {
                return Ok(false);
            };
            let mut body = parse_body(collection, &raw)?;
            patch.apply(&mut body);
            write_body(conn, collection, id, &body, patch.releases_unique_key())?;
            Ok(true)
        })
    }

    async fn update_if(
        &self,
        collection: &str,
        id: DocId,
        guard: &Filter,
        patch: &Patch,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(raw) = raw else {
                return Ok(false);
            };
            let mut body = parse_body(collection, &raw)?;
            if !guard.matches(&body) {
                return Ok(false);
            }
            patch.apply(&mut body);
            write_body(conn, collection, id, &body, patch.releases_unique_key())?;
            Ok(true)
        })
    }

    async fn update_where(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<u64> {
        self.with_conn(|conn| {
            let matched = select_matching(conn, collection, filter)?;
            let count = matched.len() as u64;
            for (id, mut body) in matched {
                patch.apply(&mut body);
                write_body(conn, collection, id, &body, patch.releases_unique_key())?;
            }
            if count > 0 {
                tracing::debug!(collection, count, "patched matching documents");
            }
            Ok(count)
        })
    }

    async fn remove(&self, collection: &str, id: DocId) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.to_string()],
            )?;
            Ok(removed > 0)
        })
    }
}
