use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Row};
use serde_json::Value;

use super::{matches_query, MemoryItem, MemoryStore, Namespace};
use crate::error::Result;
use crate::storage::{decode_time, encode_time, Database};

/// Memory store backed by the `memories` table.
#[derive(Debug, Clone)]
pub struct SqliteMemoryStore {
    db: Arc<Database>,
}

impl SqliteMemoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()> {
        let namespace = namespace.encode();
        let key = key.to_string();
        let value = serde_json::to_string(&value)?;
        self.db
            .with_conn(move |conn| {
                let now = encode_time(Utc::now());
                conn.execute(
                    "INSERT INTO memories (namespace, key, value, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(namespace, key) DO UPDATE SET value = ?3, updated_at = ?4",
                    params![namespace, key, value, now],
                )?;
                Ok(())
            })
            .await
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<MemoryItem>> {
        let namespace = namespace.encode();
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT namespace, key, value, created_at, updated_at FROM memories
                     WHERE namespace = ?1 ORDER BY created_at, key",
                )?;
                let rows = stmt.query_map(params![namespace], |row| Ok(row_to_item(row)))?;
                let mut items = Vec::new();
                for row in rows {
                    items.push(row??);
                }
                Ok(items)
            })
            .await
    }

    async fn search(&self, prefix: &Namespace, query: &str, limit: usize) -> Result<Vec<MemoryItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let prefix = prefix.encode();
        let query = query.to_string();
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT namespace, key, value, created_at, updated_at FROM memories
                     WHERE substr(namespace, 1, length(?1)) = ?1
                     ORDER BY updated_at DESC",
                )?;
                let rows = stmt.query_map(params![prefix], |row| Ok(row_to_item(row)))?;
                let mut items = Vec::new();
                for row in rows {
                    let item = row??;
                    if matches_query(&item.value, &query) {
                        items.push(item);
                        if items.len() >= limit {
                            break;
                        }
                    }
                }
                Ok(items)
            })
            .await
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<usize> {
        let namespace = namespace.encode();
        self.db
            .with_conn(move |conn| {
                Ok(conn.execute("DELETE FROM memories WHERE namespace = ?1", params![namespace])?)
            })
            .await
    }
}

fn row_to_item(row: &Row<'_>) -> Result<MemoryItem> {
    let namespace: String = row.get(0)?;
    let value: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(MemoryItem {
        namespace: Namespace::decode(&namespace),
        key: row.get(1)?,
        value: serde_json::from_str(&value)?,
        created_at: decode_time(&created_at)?,
        updated_at: decode_time(&updated_at)?,
    })
}
