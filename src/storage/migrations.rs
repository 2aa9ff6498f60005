//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::{AtlasError, Result};

/// Run all pending migrations on `conn`.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| AtlasError::Storage(format!("failed to create migrations table: {e}")))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AtlasError::Storage(format!("failed to query migration version: {e}")))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: conversations, session history, memories.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY NOT NULL,
            owner_id    TEXT,
            title       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_owner
            ON conversations(owner_id, updated_at DESC);

        CREATE TABLE IF NOT EXISTS session_checkpoints (
            thread_id   TEXT NOT NULL,
            seq         INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (thread_id, seq)
        );

        CREATE TABLE IF NOT EXISTS session_messages (
            thread_id       TEXT NOT NULL,
            position        INTEGER NOT NULL,
            checkpoint_seq  INTEGER NOT NULL,
            message         TEXT NOT NULL,
            PRIMARY KEY (thread_id, position)
        );

        CREATE TABLE IF NOT EXISTS memories (
            namespace   TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (namespace, key)
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| AtlasError::Storage(format!("failed to apply migration v1: {e}")))?;
    Ok(())
}
