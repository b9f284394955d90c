//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL
//! string that transforms the schema from version N to N+1.

use chrono::Utc;
use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, Utc::now().timestamp_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One flat table for every logical collection. Bodies are JSON
        -- text; all filtering happens in the application after decode.
        CREATE TABLE documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,              -- DocId as UUID string
            unique_key TEXT,               -- claimed uniqueness key, nullable
            body TEXT NOT NULL,            -- JSON document body
            created_at INTEGER NOT NULL,   -- Unix ms
            updated_at INTEGER NOT NULL,   -- Unix ms
            PRIMARY KEY (collection, id)
        );

        -- At most one holder per (collection, key). Released keys are set
        -- to NULL, which the partial index ignores.
        CREATE UNIQUE INDEX documents_unique_key
            ON documents(collection, unique_key)
            WHERE unique_key IS NOT NULL;
        "#,
    )?;

    Ok(())
}
