//! Convenience re-exports for common use.

pub use crate::agent::{AgentRuntime, GraphAgent, RunConfig, UserProfile};
pub use crate::config::AtlasConfig;
pub use crate::error::{AtlasError, Result};
pub use crate::ledger::ConversationLedger;
pub use crate::lifecycle::{AgentFactory, AgentManager};
pub use crate::normalize::Payload;
pub use crate::service::{AppContext, Caller};
pub use crate::session::SessionStore;
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolRegistry};
pub use crate::types::{ChatRequest, ModelMessage, RawEvent, WireEvent, WireFrame};
