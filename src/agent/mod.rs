//! Agent runtime: the step function behind a chat stream.
//!
//! The runtime consumes conversation input and emits [`RawEvent`]s; the
//! translator turns those into wire frames. Session history and memories
//! are reachable through the same seam so callers never talk to the backing
//! stores directly.

mod graph;
mod prompt;

pub use graph::GraphAgent;
pub use prompt::{build_system_prompt, BASE_SYSTEM_PROMPT};

use async_trait::async_trait;
use bon::Builder;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::Namespace;
use crate::types::{ModelMessage, RawEvent};

/// Caller details folded into the system prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Per-run settings.
#[derive(Debug, Clone, Builder)]
pub struct RunConfig {
    /// Conversation id the run reads and appends history to.
    #[builder(into)]
    pub thread_id: String,
    #[builder(into)]
    pub user_id: Option<String>,
    pub user_profile: Option<UserProfile>,
    /// Replaces the system prompt for this run when non-blank.
    #[builder(into)]
    pub system_prompt: Option<String>,
}

impl RunConfig {
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self::builder().thread_id(thread_id).build()
    }
}

/// The agent seam consumed by the chat and conversation services.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Run the agent on `input` appended to the thread's stored history.
    ///
    /// Dropping the stream stops the run at its next suspension point.
    fn stream_events(
        &self,
        input: Vec<ModelMessage>,
        config: RunConfig,
    ) -> BoxStream<'static, Result<RawEvent>>;

    /// Stored history of a thread; empty for unknown threads.
    async fn get_state(&self, thread_id: &str) -> Result<Vec<ModelMessage>>;

    /// Remove all stored history of a thread. Unknown threads are a no-op.
    async fn delete_state(&self, thread_id: &str) -> Result<()>;

    /// Remove the memories stored in `namespace`.
    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()>;
}
