//! Payload normalization: flatten model/tool payloads to text and to JSON.
//!
//! Model and tool collaborators hand back payloads of several shapes. They are
//! captured once, at the boundary, as a [`Payload`]; the two functions here
//! then never fail:
//!
//! - [`extract_text`] concatenates every text fragment and skips the rest.
//! - [`normalize_for_json`] produces a JSON-safe value, degrading to a string
//!   representation when a payload cannot be converted.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::AtlasError;
use crate::types::{ContentPart, ModelMessage};

/// An object that can dump itself into structured JSON.
pub trait StructuredDump: fmt::Debug + Send + Sync {
    fn dump(&self) -> Result<Value, AtlasError>;
}

/// A model or tool payload of any supported shape.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Scalars, sequences and mappings.
    Json(Value),
    /// A structured content list.
    Parts(Vec<ContentPart>),
    /// A message object exposing its content.
    Message(ModelMessage),
    /// An object with a structured-dump capability.
    Structured(Arc<dyn StructuredDump>),
    /// Anything else, captured by its string representation.
    Opaque(String),
}

impl Payload {
    /// Whether the payload is (or wraps) an assistant output requesting tools.
    pub fn has_tool_calls(&self) -> bool {
        match self {
            Self::Message(message) => message.has_tool_calls(),
            Self::Parts(parts) => parts
                .iter()
                .any(|part| matches!(part, ContentPart::ToolCall(_))),
            Self::Json(Value::Object(map)) => map
                .get("tool_calls")
                .and_then(Value::as_array)
                .is_some_and(|calls| !calls.is_empty()),
            _ => false,
        }
    }

    /// The content carried by a message-like payload, or the payload itself.
    ///
    /// Tool-result messages unwrap to the tool's own output (an array when a
    /// message carries several results).
    pub fn into_content(self) -> Payload {
        match self {
            Self::Message(message) => {
                let mut results: Vec<Value> = message
                    .tool_results()
                    .into_iter()
                    .map(|r| r.result.clone())
                    .collect();
                match results.len() {
                    0 => Self::Parts(message.content),
                    1 => Self::Json(results.remove(0)),
                    _ => Self::Json(Value::Array(results)),
                }
            }
            Self::Json(Value::Object(mut map)) if is_message_object(&map) => {
                Self::Json(map.remove("content").unwrap_or(Value::Null))
            }
            other => other,
        }
    }
}

/// A serialized message envelope: `content` plus a role or tool-call marker.
/// Plain mappings that merely have a `content` key are left alone.
fn is_message_object(map: &serde_json::Map<String, Value>) -> bool {
    map.contains_key("content")
        && (map.contains_key("role")
            || map.contains_key("tool_call_id")
            || map.get("type").and_then(Value::as_str) == Some("tool"))
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Json(Value::String(value))
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Json(Value::String(value.to_string()))
    }
}

impl From<ModelMessage> for Payload {
    fn from(value: ModelMessage) -> Self {
        Self::Message(value)
    }
}

impl From<Vec<ContentPart>> for Payload {
    fn from(value: Vec<ContentPart>) -> Self {
        Self::Parts(value)
    }
}

/// Best-effort conversion of a payload to plain text.
pub fn extract_text(payload: &Payload) -> String {
    match payload {
        Payload::Json(value) => text_from_value(value),
        Payload::Parts(parts) => text_from_parts(parts),
        Payload::Message(message) => message.text(),
        Payload::Structured(object) => match object.dump() {
            Ok(value) => text_from_value(&value),
            Err(err) => {
                tracing::warn!(error = %err, "structured payload dump failed; using debug text");
                format!("{object:?}")
            }
        },
        Payload::Opaque(text) => text.clone(),
    }
}

fn text_from_parts(parts: &[ContentPart]) -> String {
    let mut out = String::new();
    for part in parts {
        if let ContentPart::Text { text } = part {
            out.push_str(text);
        }
    }
    out
}

fn text_from_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let mut out = String::new();
            for item in items {
                match item {
                    Value::String(s) => out.push_str(s),
                    Value::Object(map) => {
                        let is_text = map.get("type").and_then(Value::as_str) == Some("text");
                        if let (true, Some(text)) = (is_text, map.get("text").and_then(Value::as_str)) {
                            out.push_str(text);
                        }
                    }
                    _ => {}
                }
            }
            out
        }
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                return text.to_string();
            }
            if let Some(content) = map.get("content") {
                return text_from_value(content);
            }
            value.to_string()
        }
        Value::Bool(_) | Value::Number(_) => value.to_string(),
    }
}

/// Convert a payload into a JSON-serializable normal form.
///
/// Normalizing the result again yields the same value.
pub fn normalize_for_json(payload: &Payload) -> Value {
    match payload {
        Payload::Json(value) => value.clone(),
        Payload::Parts(parts) => Value::Array(parts.iter().map(part_to_value).collect()),
        Payload::Message(message) => serde_json::to_value(message).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "message payload not serializable; using debug text");
            Value::String(format!("{message:?}"))
        }),
        Payload::Structured(object) => match object.dump() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "structured payload dump failed; using debug text");
                Value::String(format!("{object:?}"))
            }
        },
        Payload::Opaque(text) => parse_json_like(text).unwrap_or_else(|| Value::String(text.clone())),
    }
}

fn part_to_value(part: &ContentPart) -> Value {
    serde_json::to_value(part).unwrap_or_else(|_| Value::String(format!("{part:?}")))
}

/// Parse `text` back into JSON when it looks like a serialized object or array.
fn parse_json_like(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !looks_like_json {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
