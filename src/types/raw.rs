//! Raw events produced by an agent runtime.
//!
//! Untyped event records are parsed once, at the boundary, into [`RawEvent`].
//! Everything downstream dispatches on the closed [`RawEventData`] union.

use serde_json::Value;
use strum::{Display, EnumString};

use crate::normalize::Payload;

/// Scope of the reply-generating node.
pub const REPLY_SCOPE: &str = "chatbot";

/// Scope of the tool-executing node.
pub const TOOLS_SCOPE: &str = "tools";

const UNKNOWN_ERROR: &str = "Unknown error";

/// Event kinds understood by the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum RawEventKind {
    #[strum(serialize = "on_chat_model_stream")]
    ModelStreamChunk,
    #[strum(serialize = "on_chat_model_end")]
    ModelTurnEnd,
    #[strum(serialize = "on_tool_start")]
    ToolStart,
    #[strum(serialize = "on_tool_end")]
    ToolEnd,
    #[strum(serialize = "on_chain_error")]
    ChainError,
}

/// Kind-specific event payload.
#[derive(Debug, Clone)]
pub enum RawEventData {
    ModelStreamChunk {
        chunk: Payload,
    },
    /// End of one model turn. `output` is the assembled message, if any.
    ModelTurnEnd {
        output: Option<Payload>,
    },
    ToolStart {
        call_id: Option<String>,
        input: Payload,
    },
    ToolEnd {
        call_id: Option<String>,
        output: Payload,
    },
    ChainError {
        message: String,
    },
}

/// One event from the agent runtime, tagged with the node that produced it.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Node/scope identifier (e.g. [`REPLY_SCOPE`]).
    pub scope: Option<String>,
    /// Runnable name; for tool events, the tool name.
    pub name: Option<String>,
    pub data: RawEventData,
}

impl RawEvent {
    pub fn chunk(scope: &str, chunk: impl Into<Payload>) -> Self {
        Self {
            scope: Some(scope.to_string()),
            name: None,
            data: RawEventData::ModelStreamChunk {
                chunk: chunk.into(),
            },
        }
    }

    pub fn turn_end(scope: &str, output: Option<Payload>) -> Self {
        Self {
            scope: Some(scope.to_string()),
            name: None,
            data: RawEventData::ModelTurnEnd { output },
        }
    }

    pub fn tool_start(
        tool_name: impl Into<String>,
        call_id: Option<String>,
        input: impl Into<Payload>,
    ) -> Self {
        Self {
            scope: Some(TOOLS_SCOPE.to_string()),
            name: Some(tool_name.into()),
            data: RawEventData::ToolStart {
                call_id,
                input: input.into(),
            },
        }
    }

    pub fn tool_end(
        tool_name: impl Into<String>,
        call_id: Option<String>,
        output: impl Into<Payload>,
    ) -> Self {
        Self {
            scope: Some(TOOLS_SCOPE.to_string()),
            name: Some(tool_name.into()),
            data: RawEventData::ToolEnd {
                call_id,
                output: output.into(),
            },
        }
    }

    pub fn chain_error(message: impl Into<String>) -> Self {
        Self {
            scope: None,
            name: None,
            data: RawEventData::ChainError {
                message: message.into(),
            },
        }
    }

    pub fn kind(&self) -> RawEventKind {
        match self.data {
            RawEventData::ModelStreamChunk { .. } => RawEventKind::ModelStreamChunk,
            RawEventData::ModelTurnEnd { .. } => RawEventKind::ModelTurnEnd,
            RawEventData::ToolStart { .. } => RawEventKind::ToolStart,
            RawEventData::ToolEnd { .. } => RawEventKind::ToolEnd,
            RawEventData::ChainError { .. } => RawEventKind::ChainError,
        }
    }

    /// Whether the event was produced by `scope`.
    pub fn in_scope(&self, scope: &str) -> bool {
        self.scope.as_deref() == Some(scope)
    }

    /// Name reported for tool events: the runnable name, else the scope.
    pub fn tool_name(&self) -> String {
        self.name
            .as_deref()
            .or(self.scope.as_deref())
            .unwrap_or("tool")
            .to_string()
    }

    /// Parse an untyped event record. Returns `None` for kinds outside the
    /// closed set, or records without an `event` field.
    pub fn from_value(record: &Value) -> Option<Self> {
        let kind: RawEventKind = record.get("event")?.as_str()?.parse().ok()?;
        let metadata = record.get("metadata");
        let scope = ["langgraph_node", "node", "name"]
            .iter()
            .find_map(|key| metadata.and_then(|m| m.get(*key)).and_then(Value::as_str))
            .map(str::to_string);
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let data = record.get("data").cloned().unwrap_or(Value::Null);
        let call_id = data
            .get("tool_call_id")
            .or_else(|| record.get("run_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let data = match kind {
            RawEventKind::ModelStreamChunk => RawEventData::ModelStreamChunk {
                chunk: Payload::Json(data.get("chunk").cloned().unwrap_or(Value::Null)),
            },
            RawEventKind::ModelTurnEnd => RawEventData::ModelTurnEnd {
                output: output_of(&data).map(Payload::Json),
            },
            RawEventKind::ToolStart => RawEventData::ToolStart {
                call_id,
                input: Payload::Json(data.get("input").cloned().unwrap_or(Value::Null)),
            },
            RawEventKind::ToolEnd => RawEventData::ToolEnd {
                call_id,
                output: Payload::Json(output_of(&data).unwrap_or(Value::Null)),
            },
            RawEventKind::ChainError => RawEventData::ChainError {
                message: error_message(&data),
            },
        };

        Some(Self { scope, name, data })
    }
}

fn output_of(data: &Value) -> Option<Value> {
    data.get("output")
        .or_else(|| data.get("outputs"))
        .filter(|v| !v.is_null())
        .cloned()
}

fn error_message(data: &Value) -> String {
    match data.get("error").or_else(|| data.get("exception")) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
        Some(Value::String(_)) => UNKNOWN_ERROR.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::extract_text;
    use serde_json::json;

    #[test]
    fn parses_stream_chunk_with_node_metadata() {
        let event = RawEvent::from_value(&json!({
            "event": "on_chat_model_stream",
            "name": "ChatOpenAI",
            "metadata": {"langgraph_node": "chatbot"},
            "data": {"chunk": {"content": "Hel"}},
        }))
        .unwrap();

        assert_eq!(event.kind(), RawEventKind::ModelStreamChunk);
        assert!(event.in_scope(REPLY_SCOPE));
        match event.data {
            RawEventData::ModelStreamChunk { chunk } => assert_eq!(extract_text(&chunk), "Hel"),
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn scope_falls_back_to_node_then_name() {
        let event = RawEvent::from_value(&json!({
            "event": "on_tool_start",
            "metadata": {"name": "tools"},
            "data": {"input": {"q": "x"}},
        }))
        .unwrap();
        assert_eq!(event.scope.as_deref(), Some("tools"));
        assert_eq!(event.tool_name(), "tools");
    }

    #[test]
    fn turn_end_reads_outputs_when_output_missing() {
        let event = RawEvent::from_value(&json!({
            "event": "on_chat_model_end",
            "metadata": {"node": "chatbot"},
            "data": {"outputs": {"content": "done"}},
        }))
        .unwrap();
        match event.data {
            RawEventData::ModelTurnEnd { output: Some(output) } => {
                assert_eq!(extract_text(&output), "done")
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn chain_error_message_defaults() {
        let event = RawEvent::from_value(&json!({"event": "on_chain_error", "data": {}})).unwrap();
        match event.data {
            RawEventData::ChainError { message } => assert_eq!(message, "Unknown error"),
            other => panic!("unexpected data: {other:?}"),
        }

        let event = RawEvent::from_value(&json!({
            "event": "on_chain_error",
            "data": {"exception": "boom"},
        }))
        .unwrap();
        match event.data {
            RawEventData::ChainError { message } => assert_eq!(message, "boom"),
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn unknown_kinds_are_dropped() {
        assert!(RawEvent::from_value(&json!({"event": "on_chain_start"})).is_none());
        assert!(RawEvent::from_value(&json!({"data": {}})).is_none());
    }

    #[test]
    fn tool_call_id_prefers_data_field() {
        let event = RawEvent::from_value(&json!({
            "event": "on_tool_end",
            "name": "location_weather_tool",
            "run_id": "run-1",
            "data": {"tool_call_id": "call-9", "output": "sunny"},
        }))
        .unwrap();
        match event.data {
            RawEventData::ToolEnd { call_id, .. } => assert_eq!(call_id.as_deref(), Some("call-9")),
            other => panic!("unexpected data: {other:?}"),
        }
    }
}
