//! Tools the agent runtime can call.

pub mod builtin;
pub mod registry;
pub mod tool;
pub mod types;

pub use registry::ToolRegistry;
pub use tool::{AgentTool, Tool, ToolContext};
pub use types::{AgentToolParameters, ToolArguments, ToolDefinition};
