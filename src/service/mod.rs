//! Application services: streaming chat and conversation management.
//!
//! [`AppContext`] is built once at startup and handed to every operation;
//! there is no process-global state.

mod chat;
mod conversations;

pub use chat::ChatService;
pub use conversations::ConversationService;

use std::sync::Arc;

use tracing::warn;

use crate::agent::UserProfile;
use crate::config::AtlasConfig;
use crate::ledger::ConversationLedger;
use crate::lifecycle::{AgentManager, Closeable};
use crate::types::OwnerId;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    /// `None` for anonymous callers, who only see ownerless conversations.
    pub user_id: Option<OwnerId>,
    pub profile: Option<UserProfile>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: OwnerId) -> Self {
        Self {
            user_id: Some(user_id),
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Shared handles for all services.
#[derive(Clone)]
pub struct AppContext {
    pub config: AtlasConfig,
    pub ledger: Arc<dyn ConversationLedger>,
    pub agents: Arc<AgentManager>,
    ledger_resource: Option<Arc<dyn Closeable>>,
}

impl AppContext {
    pub fn new(
        config: AtlasConfig,
        ledger: Arc<dyn ConversationLedger>,
        agents: Arc<AgentManager>,
    ) -> Self {
        Self {
            config,
            ledger,
            agents,
            ledger_resource: None,
        }
    }

    /// SQLite ledger at `config.database_path` and an OpenAI-backed agent
    /// over `config.state_path`.
    #[cfg(all(feature = "sqlite", feature = "openai"))]
    pub fn open(config: AtlasConfig) -> crate::error::Result<Self> {
        use crate::ledger::SqliteLedger;
        use crate::lifecycle::SqliteAgentFactory;
        use crate::storage::Database;

        let db = Database::open(&config.database_path, config.pool_size)?;
        let ledger = Arc::new(SqliteLedger::new(
            db.clone(),
            config.default_title.clone(),
            config.title_max_chars,
        ));
        let factory = SqliteAgentFactory::from_config(config.clone())?;
        let agents = Arc::new(AgentManager::new(Arc::new(factory)));

        let mut ctx = Self::new(config, ledger, agents);
        ctx.ledger_resource = Some(db as Arc<dyn Closeable>);
        Ok(ctx)
    }

    pub fn chat(&self) -> ChatService {
        ChatService::new(self.clone())
    }

    pub fn conversations(&self) -> ConversationService {
        ConversationService::new(self.clone())
    }

    /// Close the agent resources and the ledger database.
    pub async fn shutdown(&self) {
        self.agents.close().await;
        if let Some(resource) = &self.ledger_resource {
            if let Err(e) = resource.close().await {
                warn!(error = %e, "failed to close ledger database");
            }
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("model", &self.config.model)
            .field("agents", &self.agents)
            .finish()
    }
}
