//! Database schema migrations for SQLite.
//!
//! Versioned: each migration moves the schema from version N to N+1 and is
//! recorded in `schema_migrations`.

use rusqlite::Connection;

use opsdeck_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: running it against an up-to-date database does nothing.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
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

/// Migration v1: credentials, audit trail, servers.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE credentials (
            id BLOB PRIMARY KEY,              -- 16 bytes
            title TEXT NOT NULL,
            username TEXT,
            secret TEXT NOT NULL,             -- hex of the sealed envelope
            url TEXT,
            notes TEXT,
            creator_id BLOB NOT NULL,
            creator_name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE audit_log (
            seq INTEGER PRIMARY KEY,          -- starts at 1, no gaps
            timestamp INTEGER NOT NULL,       -- Unix ms, assigned at append
            actor_id BLOB NOT NULL,
            actor_name TEXT NOT NULL,
            actor_role TEXT NOT NULL,
            action TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            origin TEXT,
            outcome TEXT NOT NULL,
            detail TEXT NOT NULL,             -- JSON
            prev_hash BLOB NOT NULL,          -- 32 bytes
            entry_hash BLOB NOT NULL          -- 32 bytes
        );

        CREATE TRIGGER audit_log_no_update
        BEFORE UPDATE ON audit_log
        BEGIN
            SELECT RAISE(ABORT, 'audit_log is append-only');
        END;

        CREATE TRIGGER audit_log_no_delete
        BEFORE DELETE ON audit_log
        BEGIN
            SELECT RAISE(ABORT, 'audit_log is append-only');
        END;

        CREATE TABLE servers (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            status TEXT NOT NULL,             -- up | down | unknown
            last_probe_at INTEGER,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_credentials_created ON credentials(created_at);
        CREATE INDEX idx_audit_actor ON audit_log(actor_id);
        CREATE INDEX idx_audit_resource ON audit_log(resource_type, resource_id);
        CREATE INDEX idx_audit_timestamp ON audit_log(timestamp);
        CREATE INDEX idx_servers_created ON servers(created_at);
        "#,
    )?;

    Ok(())
}
