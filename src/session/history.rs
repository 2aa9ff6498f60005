//! Rendering stored history for client display.

use std::collections::HashMap;

use crate::normalize::{extract_text, normalize_for_json, Payload};
use crate::types::{ConversationMessage, ModelMessage, Role, ToolStatus};

/// Render stored messages as client-facing history.
///
/// Tool calls open a `pending` entry keyed by call id. A later result with
/// the same id completes that entry in place, whatever order results
/// arrive in. Results with no pending entry are appended on their own as
/// `complete`.
pub fn render_history(messages: &[ModelMessage]) -> Vec<ConversationMessage> {
    let mut rendered: Vec<ConversationMessage> = Vec::new();
    let mut pending: HashMap<String, usize> = HashMap::new();

    for message in messages {
        match message.role {
            Role::System => {}
            Role::User => {
                let content = message.text();
                let content = content.trim();
                if !content.is_empty() {
                    rendered.push(ConversationMessage::user(content));
                }
            }
            Role::Assistant => {
                let content = message.text();
                let content = content.trim();
                if !content.is_empty() {
                    rendered.push(ConversationMessage::assistant(content));
                }
                for call in message.tool_calls() {
                    let name = if call.name.is_empty() { "tool" } else { call.name.as_str() };
                    let call_id = if call.id.is_empty() {
                        format!("{name}-{}", pending.len())
                    } else {
                        call.id.clone()
                    };
                    let mut entry =
                        ConversationMessage::tool(name, ToolStatus::Pending, Some(call_id.clone()));
                    entry.tool_input = Some(normalize_for_json(&Payload::Json(call.arguments.clone())));
                    pending.insert(call_id, rendered.len());
                    rendered.push(entry);
                }
            }
            Role::Tool => {
                let tool_name = message.name.clone().unwrap_or_else(|| "tool".to_string());
                for result in message.tool_results() {
                    let payload = Payload::Json(result.result.clone());
                    let output = normalize_for_json(&payload);
                    let content = extract_text(&payload).trim().to_string();

                    let slot = (!result.tool_call_id.is_empty())
                        .then(|| pending.remove(&result.tool_call_id))
                        .flatten();
                    match slot {
                        Some(index) => {
                            let entry = &mut rendered[index];
                            entry.tool_status = Some(if result.is_error {
                                ToolStatus::Error
                            } else {
                                ToolStatus::Complete
                            });
                            entry.tool_output = Some(output);
                            if message.name.is_some() {
                                entry.tool_name = Some(tool_name.clone());
                            }
                            if !content.is_empty() {
                                entry.content = content;
                            }
                        }
                        None => {
                            let call_id =
                                (!result.tool_call_id.is_empty()).then(|| result.tool_call_id.clone());
                            let mut entry =
                                ConversationMessage::tool(tool_name.clone(), ToolStatus::Complete, call_id);
                            entry.content = content;
                            entry.tool_output = Some(output);
                            rendered.push(entry);
                        }
                    }
                }
            }
        }
    }

    rendered
}
