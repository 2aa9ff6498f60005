use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{resolve_title, suggest_title, ConversationLedger};
use crate::config::{DEFAULT_TITLE, DEFAULT_TITLE_MAX_CHARS};
use crate::error::{AtlasError, Result};
use crate::types::{ConversationId, ConversationSummary, OwnerId};

/// In-process ledger, used for tests and ephemeral sessions.
#[derive(Debug)]
pub struct MemoryLedger {
    rows: RwLock<HashMap<ConversationId, ConversationSummary>>,
    default_title: String,
    title_max_chars: usize,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE, DEFAULT_TITLE_MAX_CHARS)
    }
}

impl MemoryLedger {
    pub fn new(default_title: impl Into<String>, title_max_chars: usize) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            default_title: default_title.into(),
            title_max_chars,
        }
    }
}

#[async_trait]
impl ConversationLedger for MemoryLedger {
    fn default_title(&self) -> &str {
        &self.default_title
    }

    async fn ensure(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
        title: Option<&str>,
    ) -> Result<ConversationSummary> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.get(&id) {
            if !existing.is_owned_by(owner) {
                return Err(AtlasError::conversation_not_found());
            }
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let row = ConversationSummary {
            id,
            owner_id: owner,
            title: resolve_title(title, &self.default_title),
            created_at: now,
            updated_at: now,
        };
        rows.insert(id, row.clone());
        Ok(row)
    }

    async fn maybe_update_title(&self, id: ConversationId, text: &str) -> Result<()> {
        let Some(suggested) = suggest_title(text, self.title_max_chars) else {
            return Ok(());
        };
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(&id) {
            if row.title.is_empty() || row.title == self.default_title {
                row.title = suggested;
                row.updated_at = Utc::now().max(row.updated_at);
            }
        }
        Ok(())
    }

    async fn touch(&self, id: ConversationId) -> Result<()> {
        if let Some(row) = self.rows.write().await.get_mut(&id) {
            row.updated_at = Utc::now().max(row.updated_at);
        }
        Ok(())
    }

    async fn get(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
    ) -> Result<Option<ConversationSummary>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&id)
            .filter(|row| row.is_owned_by(owner))
            .cloned())
    }

    async fn list(&self, owner: Option<OwnerId>) -> Result<Vec<ConversationSummary>> {
        let mut rows: Vec<_> = self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.is_owned_by(owner))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn delete(&self, id: ConversationId, owner: Option<OwnerId>) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.get(&id) {
            Some(row) if row.is_owned_by(owner) => {
                rows.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
