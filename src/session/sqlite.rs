use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Checkpoint, SessionStore};
use crate::error::{AtlasError, Result};
use crate::storage::{decode_time, encode_time, Database};
use crate::types::ModelMessage;

/// Session store backed by `session_checkpoints` / `session_messages`.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    db: Arc<Database>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn append(&self, thread_id: &str, messages: &[ModelMessage]) -> Result<Checkpoint> {
        let thread_id = thread_id.to_string();
        let encoded = messages
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.db
            .with_conn(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let seq: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(seq), 0) + 1 FROM session_checkpoints WHERE thread_id = ?1",
                    params![thread_id],
                    |row| row.get(0),
                )?;
                let mut position: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(position), -1) + 1 FROM session_messages WHERE thread_id = ?1",
                    params![thread_id],
                    |row| row.get(0),
                )?;
                let created_at = Utc::now();
                tx.execute(
                    "INSERT INTO session_checkpoints (thread_id, seq, created_at) VALUES (?1, ?2, ?3)",
                    params![thread_id, seq, encode_time(created_at)],
                )?;
                for message in &encoded {
                    tx.execute(
                        "INSERT INTO session_messages (thread_id, position, checkpoint_seq, message)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![thread_id, position, seq, message],
                    )?;
                    position += 1;
                }
                tx.commit()?;
                Ok(Checkpoint {
                    thread_id,
                    seq: seq as u64,
                    created_at,
                    message_count: position as usize,
                })
            })
            .await
    }

    async fn get_state(&self, thread_id: &str) -> Result<Vec<ModelMessage>> {
        let thread_id = thread_id.to_string();
        self.db
            .with_conn(move |conn| load_messages(conn, &thread_id, None))
            .await
    }

    async fn get_state_at(&self, thread_id: &str, seq: u64) -> Result<Vec<ModelMessage>> {
        let thread_id = thread_id.to_string();
        self.db
            .with_conn(move |conn| {
                let exists = conn
                    .query_row(
                        "SELECT 1 FROM session_checkpoints WHERE thread_id = ?1 AND seq = ?2",
                        params![thread_id, seq as i64],
                        |_| Ok(()),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Err(AtlasError::NotFound(format!(
                        "checkpoint {seq} of thread {thread_id}"
                    )));
                }
                load_messages(conn, &thread_id, Some(seq as i64))
            })
            .await
    }

    async fn list_checkpoints(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let thread_id = thread_id.to_string();
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.seq, c.created_at,
                            (SELECT COUNT(*) FROM session_messages m
                             WHERE m.thread_id = c.thread_id AND m.checkpoint_seq <= c.seq)
                     FROM session_checkpoints c
                     WHERE c.thread_id = ?1
                     ORDER BY c.seq",
                )?;
                let rows = stmt.query_map(params![thread_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?;
                let mut checkpoints = Vec::new();
                for row in rows {
                    let (seq, created_at, count) = row?;
                    checkpoints.push(Checkpoint {
                        thread_id: thread_id.clone(),
                        seq: seq as u64,
                        created_at: decode_time(&created_at)?,
                        message_count: count as usize,
                    });
                }
                Ok(checkpoints)
            })
            .await
    }

    async fn delete_state(&self, thread_id: &str) -> Result<()> {
        let thread_id = thread_id.to_string();
        self.db
            .with_conn(move |conn| {
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "DELETE FROM session_messages WHERE thread_id = ?1",
                    params![thread_id],
                )?;
                tx.execute(
                    "DELETE FROM session_checkpoints WHERE thread_id = ?1",
                    params![thread_id],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
    }
}

fn load_messages(conn: &Connection, thread_id: &str, upto: Option<i64>) -> Result<Vec<ModelMessage>> {
    let mut stmt = conn.prepare(
        "SELECT message FROM session_messages
         WHERE thread_id = ?1 AND (?2 IS NULL OR checkpoint_seq <= ?2)
         ORDER BY position",
    )?;
    let rows = stmt.query_map(params![thread_id, upto], |row| row.get::<_, String>(0))?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(serde_json::from_str(&row?)?);
    }
    Ok(messages)
}
