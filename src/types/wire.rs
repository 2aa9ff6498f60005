//! Outward streaming protocol.
//!
//! A chat stream is a sequence of [`WireFrame`]s encoded as newline-delimited
//! JSON. Every frame repeats the conversation's checkpoint id:
//!
//! ```text
//! {"type":"checkpoint","checkpoint_id":"6f1c…"}
//! {"type":"response_chunk","text":"It is","checkpoint_id":"6f1c…"}
//! {"type":"final_response","text":"It is sunny.","checkpoint_id":"6f1c…"}
//! {"type":"done","checkpoint_id":"6f1c…"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One application-level event sent to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// Announces a newly minted conversation id. Always first when present.
    Checkpoint,
    ResponseChunk {
        text: String,
    },
    FinalResponse {
        text: String,
    },
    ToolCall {
        tool_name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_name: String,
        output: serde_json::Value,
    },
    /// Terminal: nothing follows an error.
    Error {
        message: String,
    },
    /// Terminal: sent exactly once on success.
    Done,
}

impl WireEvent {
    /// Whether this event ends a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }
}

/// A [`WireEvent`] bound to the conversation it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireFrame {
    #[serde(flatten)]
    pub event: WireEvent,
    pub checkpoint_id: String,
}

impl WireFrame {
    pub fn new(checkpoint_id: impl Into<String>, event: WireEvent) -> Self {
        Self {
            event,
            checkpoint_id: checkpoint_id.into(),
        }
    }

    /// Encode as a single NDJSON line, including the trailing newline.
    pub fn to_ndjson(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn is_terminal(&self) -> bool {
        self.event.is_terminal()
    }
}

/// Request body for the streaming chat operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub checkpoint_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            checkpoint_id: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}
