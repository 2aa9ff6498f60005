//! Chat model seam used by the agent runtime.

pub mod http;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiChatModel;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::tools::ToolDefinition;
use crate::types::{AgentToolCall, FinishReason, GenerationSettings, ModelMessage, Usage};

/// A request sent to a chat model.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

/// One increment of a streamed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    Text(String),
    /// A fully assembled tool call.
    ToolCall(AgentToolCall),
    Done {
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
}

/// A streaming chat model with tool calling.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Start one model turn. Errors before the first delta are returned
    /// directly; later failures arrive as `Err` items.
    async fn stream(&self, request: &ModelRequest) -> Result<BoxStream<'static, Result<ModelDelta>>>;
}
