use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{AgentFactory, ResourceScope};
use crate::agent::{AgentRuntime, GraphAgent};
use crate::config::AtlasConfig;
use crate::error::Result;
use crate::memory::{MemoryStore, SqliteMemoryStore};
use crate::model::{ChatModel, OpenAiChatModel};
use crate::session::SqliteSessionStore;
use crate::storage::Database;
use crate::tools::builtin::memory_retriever_tool;
use crate::tools::ToolRegistry;

/// Builds a [`GraphAgent`] over the SQLite state database.
///
/// Each build opens a fresh connection pool and registers it in the scope,
/// so a refresh replaces connections that went stale.
pub struct SqliteAgentFactory {
    config: AtlasConfig,
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
}

impl SqliteAgentFactory {
    pub fn new(config: AtlasConfig, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config,
            model,
            tools: ToolRegistry::new(),
        }
    }

    /// Use the OpenAI-compatible model named in `config`.
    pub fn from_config(config: AtlasConfig) -> Result<Self> {
        let model = Arc::new(OpenAiChatModel::from_config(&config)?);
        Ok(Self::new(config, model))
    }

    /// Bind additional tools next to the built-in memory retriever.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }
}

#[async_trait]
impl AgentFactory for SqliteAgentFactory {
    async fn build(&self, scope: &mut ResourceScope) -> Result<Arc<dyn AgentRuntime>> {
        let db = Database::open(&self.config.state_path, self.config.pool_size)?;
        scope.register("state-db", db.clone());

        let sessions = Arc::new(SqliteSessionStore::new(db.clone()));
        let memories: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(db));

        let mut tools = self.tools.clone();
        tools.register(memory_retriever_tool(memories.clone()));

        let mut agent = GraphAgent::new(self.model.clone(), sessions, tools)
            .with_memory(memories)
            .with_max_steps(self.config.max_steps);
        if let Some(prompt) = &self.config.system_prompt {
            agent = agent.with_base_prompt(prompt.clone());
        }

        info!(model = %self.model.model_id(), tools = ?agent.tools().names(), "agent built");
        Ok(Arc::new(agent))
    }
}
