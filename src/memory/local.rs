use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{matches_query, MemoryItem, MemoryStore, Namespace};
use crate::error::Result;

/// In-process memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: RwLock<BTreeMap<(Namespace, String), MemoryItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn put(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()> {
        let now = Utc::now();
        let mut items = self.items.write().await;
        items
            .entry((namespace.clone(), key.to_string()))
            .and_modify(|item| {
                item.value = value.clone();
                item.updated_at = now;
            })
            .or_insert_with(|| MemoryItem {
                namespace: namespace.clone(),
                key: key.to_string(),
                value,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<MemoryItem>> {
        let mut found: Vec<_> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| &item.namespace == namespace)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)));
        Ok(found)
    }

    async fn search(&self, prefix: &Namespace, query: &str, limit: usize) -> Result<Vec<MemoryItem>> {
        let mut found: Vec<_> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.namespace.starts_with(prefix) && matches_query(&item.value, query))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<usize> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|(ns, _), _| ns != namespace);
        Ok(before - items.len())
    }
}
