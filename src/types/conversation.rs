//! Conversation metadata and the client-facing view of stored history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a conversation; doubles as the session thread id.
pub type ConversationId = Uuid;

/// Identifier of the user owning a conversation.
pub type OwnerId = Uuid;

/// Ledger row for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    /// Whether the row is visible to `owner`. Ownerless rows are only
    /// visible to ownerless callers.
    pub fn is_owned_by(&self, owner: Option<OwnerId>) -> bool {
        self.owner_id == owner
    }
}

/// A conversation with its rendered message history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
    Tool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// Status of a tool invocation in rendered history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Complete,
    Error,
}

/// One turn of history as shown to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub kind: MessageKind,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<ToolStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<serde_json::Value>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Message,
            role,
            content: content.into(),
            tool_name: None,
            tool_status: None,
            tool_call_id: None,
            tool_input: None,
            tool_output: None,
        }
    }

    /// A tool entry with no content yet.
    pub fn tool(name: impl Into<String>, status: ToolStatus, call_id: Option<String>) -> Self {
        Self {
            kind: MessageKind::Tool,
            role: MessageRole::Tool,
            content: String::new(),
            tool_name: Some(name.into()),
            tool_status: Some(status),
            tool_call_id: call_id,
            tool_input: None,
            tool_output: None,
        }
    }
}

/// Request body for creating a conversation explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationCreateRequest {
    #[serde(default)]
    pub title: Option<String>,
}
