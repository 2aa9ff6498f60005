//! Session state: append-only, per-thread message history.
//!
//! Every [`SessionStore::append`] creates a numbered checkpoint, so history
//! can be read as it stood after any earlier step.

mod history;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use history::render_history;
pub use memory::MemorySessionStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ModelMessage;

/// One persisted step of a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    /// 1-based, increasing per thread.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    /// Total messages in the thread as of this checkpoint.
    pub message_count: usize,
}

/// Durable execution state keyed by thread id.
///
/// Reads and deletes on an unknown thread return empty / succeed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append `messages` to the thread as a new checkpoint.
    async fn append(&self, thread_id: &str, messages: &[ModelMessage]) -> Result<Checkpoint>;

    /// Full history, oldest first.
    async fn get_state(&self, thread_id: &str) -> Result<Vec<ModelMessage>>;

    /// History as of checkpoint `seq`. Unknown checkpoints are not-found.
    async fn get_state_at(&self, thread_id: &str, seq: u64) -> Result<Vec<ModelMessage>>;

    async fn list_checkpoints(&self, thread_id: &str) -> Result<Vec<Checkpoint>>;

    /// Remove all messages and checkpoints of the thread.
    async fn delete_state(&self, thread_id: &str) -> Result<()>;
}
