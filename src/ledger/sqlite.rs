use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{resolve_title, suggest_title, ConversationLedger};
use crate::error::{AtlasError, Result};
use crate::storage::{decode_time, encode_time, Database};
use crate::types::{ConversationId, ConversationSummary, OwnerId};

const SELECT_COLUMNS: &str = "SELECT id, owner_id, title, created_at, updated_at FROM conversations";

/// Ledger backed by the `conversations` table.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    db: Arc<Database>,
    default_title: String,
    title_max_chars: usize,
}

impl SqliteLedger {
    pub fn new(db: Arc<Database>, default_title: impl Into<String>, title_max_chars: usize) -> Self {
        Self {
            db,
            default_title: default_title.into(),
            title_max_chars,
        }
    }
}

#[async_trait]
impl ConversationLedger for SqliteLedger {
    fn default_title(&self) -> &str {
        &self.default_title
    }

    async fn ensure(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
        title: Option<&str>,
    ) -> Result<ConversationSummary> {
        let title = resolve_title(title, &self.default_title);
        self.db
            .with_conn(move |conn| {
                let now = encode_time(Utc::now());
                conn.execute(
                    "INSERT INTO conversations (id, owner_id, title, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(id) DO NOTHING",
                    params![id.to_string(), owner.map(|o| o.to_string()), title, now],
                )?;
                match fetch(conn, id)? {
                    Some(row) if row.is_owned_by(owner) => Ok(row),
                    _ => Err(AtlasError::conversation_not_found()),
                }
            })
            .await
    }

    async fn maybe_update_title(&self, id: ConversationId, text: &str) -> Result<()> {
        let Some(suggested) = suggest_title(text, self.title_max_chars) else {
            return Ok(());
        };
        let default_title = self.default_title.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE conversations SET title = ?2, updated_at = ?3
                     WHERE id = ?1 AND (title = ?4 OR title = '')",
                    params![id.to_string(), suggested, encode_time(Utc::now()), default_title],
                )?;
                Ok(())
            })
            .await
    }

    async fn touch(&self, id: ConversationId) -> Result<()> {
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                    params![id.to_string(), encode_time(Utc::now())],
                )?;
                Ok(())
            })
            .await
    }

    async fn get(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
    ) -> Result<Option<ConversationSummary>> {
        self.db
            .with_conn(move |conn| Ok(fetch(conn, id)?.filter(|row| row.is_owned_by(owner))))
            .await
    }

    async fn list(&self, owner: Option<OwnerId>) -> Result<Vec<ConversationSummary>> {
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE owner_id IS ?1
                     ORDER BY updated_at DESC, created_at DESC"
                ))?;
                let rows = stmt.query_map(params![owner.map(|o| o.to_string())], |row| {
                    Ok(row_to_summary(row))
                })?;
                let mut summaries = Vec::new();
                for row in rows {
                    summaries.push(row??);
                }
                Ok(summaries)
            })
            .await
    }

    async fn delete(&self, id: ConversationId, owner: Option<OwnerId>) -> Result<bool> {
        self.db
            .with_conn(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM conversations WHERE id = ?1 AND owner_id IS ?2",
                    params![id.to_string(), owner.map(|o| o.to_string())],
                )?;
                Ok(removed > 0)
            })
            .await
    }
}

fn fetch(conn: &Connection, id: ConversationId) -> Result<Option<ConversationSummary>> {
    let row = conn
        .query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![id.to_string()],
            |row| Ok(row_to_summary(row)),
        )
        .optional()?;
    row.transpose()
}

fn row_to_summary(row: &Row<'_>) -> Result<ConversationSummary> {
    let id: String = row.get(0)?;
    let owner: Option<String> = row.get(1)?;
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(ConversationSummary {
        id: parse_uuid(&id)?,
        owner_id: owner.as_deref().map(parse_uuid).transpose()?,
        title: row.get(2)?,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AtlasError::Storage(format!("invalid uuid {raw:?}: {e}")))
}
