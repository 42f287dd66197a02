//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system: each migration transforms the
//! schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent - safe to call multiple times.
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
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

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
        -- Live policies, keyed by the once-assigned id.
        CREATE TABLE policies (
            id TEXT PRIMARY KEY,            -- 32 hex chars
            author TEXT NOT NULL,           -- author identity, immutable
            rpid TEXT,                      -- resource-policy grouping key, nullable
            doc TEXT NOT NULL,              -- wire JSON document
            updated_at INTEGER NOT NULL     -- Unix ms
        );

        CREATE INDEX idx_policies_author ON policies(author);
        CREATE INDEX idx_policies_rpid ON policies(rpid) WHERE rpid IS NOT NULL;

        -- Shared policies governing resource-policy groups.
        CREATE TABLE shared_policies (
            rpid TEXT PRIMARY KEY,
            doc TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Append-only audit log. Never updated, never deleted.
        CREATE TABLE events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            policy_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            timestamp INTEGER NOT NULL,     -- Unix ms
            outcome INTEGER NOT NULL,       -- 1 allowed, 0 denied
            reason TEXT NOT NULL,           -- role used or denial cause
            source_location TEXT            -- approximate origin, nullable
        );

        CREATE INDEX idx_events_policy ON events(policy_id);
        "#,
    )?;
    Ok(())
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
