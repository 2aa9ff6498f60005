//! Conversation ledger: durable conversation metadata.
//!
//! Every owner-scoped operation treats a row owned by someone else exactly
//! like a missing row.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryLedger;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConversationId, ConversationSummary, OwnerId};

/// Store of conversation rows (id, owner, title, timestamps).
#[async_trait]
pub trait ConversationLedger: Send + Sync {
    /// Title given to new conversations.
    fn default_title(&self) -> &str;

    /// Create the row if it does not exist and return it. An existing row
    /// owned by a different owner yields [`AtlasError::NotFound`].
    ///
    /// [`AtlasError::NotFound`]: crate::error::AtlasError::NotFound
    async fn ensure(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
        title: Option<&str>,
    ) -> Result<ConversationSummary>;

    /// Retitle from `text` while the title is still the default. Also bumps
    /// `updated_at` when it applies.
    async fn maybe_update_title(&self, id: ConversationId, text: &str) -> Result<()>;

    /// Bump `updated_at`. A missing row is a no-op.
    async fn touch(&self, id: ConversationId) -> Result<()>;

    async fn get(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
    ) -> Result<Option<ConversationSummary>>;

    /// All conversations for `owner`, most recently updated first.
    async fn list(&self, owner: Option<OwnerId>) -> Result<Vec<ConversationSummary>>;

    /// Delete the row. Returns `false` when absent or not owned.
    async fn delete(&self, id: ConversationId, owner: Option<OwnerId>) -> Result<bool>;
}

/// Auto-title for `message`: its first `max_chars` characters after
/// trimming, or `None` for a blank message.
pub fn suggest_title(message: &str, max_chars: usize) -> Option<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_chars).collect())
}

/// Title for an explicit create: trimmed, or `default` when blank.
pub fn resolve_title(requested: Option<&str>, default: &str) -> String {
    requested
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(default)
        .to_string()
}
