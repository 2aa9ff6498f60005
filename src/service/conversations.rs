use tracing::{info, warn};
use uuid::Uuid;

use super::{AppContext, Caller};
use crate::error::{AtlasError, Result};
use crate::memory::Namespace;
use crate::session::render_history;
use crate::types::{ConversationDetail, ConversationId, ConversationSummary};

/// Create, list, read and delete conversations.
#[derive(Debug, Clone)]
pub struct ConversationService {
    ctx: AppContext,
}

impl ConversationService {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Create a conversation. A blank or missing title becomes the default.
    pub async fn create(&self, caller: &Caller, title: Option<&str>) -> Result<ConversationSummary> {
        let id = Uuid::new_v4();
        self.ctx.ledger.ensure(id, caller.user_id, title).await?;
        self.ctx
            .ledger
            .get(id, caller.user_id)
            .await?
            .ok_or_else(|| AtlasError::Storage("failed to create conversation".to_string()))
    }

    /// The caller's conversations, most recently updated first.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<ConversationSummary>> {
        self.ctx.ledger.list(caller.user_id).await
    }

    /// Conversation metadata plus rendered history.
    ///
    /// A stale session backend triggers one agent refresh and one retry; if
    /// that fails too the result is [`AtlasError::ServiceUnavailable`].
    pub async fn get(&self, caller: &Caller, id: ConversationId) -> Result<ConversationDetail> {
        let summary = self
            .ctx
            .ledger
            .get(id, caller.user_id)
            .await?
            .ok_or_else(AtlasError::conversation_not_found)?;

        let thread_id = id.to_string();
        let messages = self
            .ctx
            .agents
            .with_refresh_retry(move |agent| {
                let thread_id = thread_id.clone();
                async move { agent.get_state(&thread_id).await }
            })
            .await?;

        Ok(ConversationDetail {
            summary,
            messages: render_history(&messages),
        })
    }

    /// Delete the conversation, then (best-effort) its session state and
    /// memories.
    pub async fn delete(&self, caller: &Caller, id: ConversationId) -> Result<()> {
        if !self.ctx.ledger.delete(id, caller.user_id).await? {
            return Err(AtlasError::conversation_not_found());
        }
        info!(conversation_id = %id, "conversation deleted");

        let agent = match self.ctx.agents.get_agent().await {
            Ok(agent) => agent,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "skipping state cleanup");
                return Ok(());
            }
        };
        let thread_id = id.to_string();
        if let Err(e) = agent.delete_state(&thread_id).await {
            warn!(conversation_id = %id, error = %e, "failed to delete session state");
        }
        if let Some(user_id) = caller.user_id {
            let namespace = Namespace::conversation(&user_id.to_string(), &thread_id);
            if let Err(e) = agent.delete_namespace(&namespace).await {
                warn!(conversation_id = %id, error = %e, "failed to delete memories");
            }
        }
        Ok(())
    }
}
