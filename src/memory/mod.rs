//! Long-term memory items grouped into hierarchical namespaces.
//!
//! The agent records each user/assistant exchange under
//! `("users", user_id, "memory", thread_id)`; deleting a conversation drops
//! that namespace.

mod local;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use local::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMemoryStore;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

const SEPARATOR: char = '\u{1f}';

/// Hierarchical namespace, e.g. `users / <id> / memory / <thread>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Namespace(Vec<String>);

impl Namespace {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Memories of every conversation of `user_id`.
    pub fn user_memories(user_id: &str) -> Self {
        Self::new(["users", user_id, "memory"])
    }

    /// Memories recorded in one conversation.
    pub fn conversation(user_id: &str, thread_id: &str) -> Self {
        Self::new(["users", user_id, "memory", thread_id])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &Namespace) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Storage key: segments joined and terminated by a separator, so that a
    /// textual prefix match is a namespace prefix match.
    pub(crate) fn encode(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push_str(segment);
            out.push(SEPARATOR);
        }
        out
    }

    pub(crate) fn decode(raw: &str) -> Self {
        Self(
            raw.split(SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// One stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub namespace: Namespace,
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Namespaced key/value memory store.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert or replace `key` in `namespace`.
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()>;

    /// Items stored directly in `namespace`, oldest first.
    async fn list(&self, namespace: &Namespace) -> Result<Vec<MemoryItem>>;

    /// Up to `limit` items at or beneath `prefix` whose value mentions every
    /// word of `query` (case-insensitive), most recent first.
    async fn search(&self, prefix: &Namespace, query: &str, limit: usize) -> Result<Vec<MemoryItem>>;

    /// Remove every item stored directly in `namespace`. Returns the count.
    async fn delete_namespace(&self, namespace: &Namespace) -> Result<usize>;
}

pub(crate) fn matches_query(value: &Value, query: &str) -> bool {
    let haystack = value.to_string().to_lowercase();
    query
        .split_whitespace()
        .all(|word| haystack.contains(&word.to_lowercase()))
}
