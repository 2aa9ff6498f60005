use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Checkpoint, SessionStore};
use crate::error::{AtlasError, Result};
use crate::types::ModelMessage;

#[derive(Debug, Default)]
struct Thread {
    messages: Vec<ModelMessage>,
    checkpoints: Vec<Checkpoint>,
}

/// In-process session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    threads: RwLock<HashMap<String, Thread>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn append(&self, thread_id: &str, messages: &[ModelMessage]) -> Result<Checkpoint> {
        let mut threads = self.threads.write().await;
        let thread = threads.entry(thread_id.to_string()).or_default();
        thread.messages.extend_from_slice(messages);
        let checkpoint = Checkpoint {
            thread_id: thread_id.to_string(),
            seq: thread.checkpoints.len() as u64 + 1,
            created_at: Utc::now(),
            message_count: thread.messages.len(),
        };
        thread.checkpoints.push(checkpoint.clone());
        Ok(checkpoint)
    }

    async fn get_state(&self, thread_id: &str) -> Result<Vec<ModelMessage>> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .map(|t| t.messages.clone())
            .unwrap_or_default())
    }

    async fn get_state_at(&self, thread_id: &str, seq: u64) -> Result<Vec<ModelMessage>> {
        let threads = self.threads.read().await;
        let checkpoint = threads
            .get(thread_id)
            .and_then(|t| t.checkpoints.iter().find(|c| c.seq == seq).map(|c| (t, c)));
        match checkpoint {
            Some((thread, cp)) => Ok(thread.messages[..cp.message_count].to_vec()),
            None => Err(AtlasError::NotFound(format!(
                "checkpoint {seq} of thread {thread_id}"
            ))),
        }
    }

    async fn list_checkpoints(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .map(|t| t.checkpoints.clone())
            .unwrap_or_default())
    }

    async fn delete_state(&self, thread_id: &str) -> Result<()> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }
}
