//! The translation state machine, free of I/O.

use std::collections::HashMap;

use tracing::debug;

use crate::normalize::{extract_text, normalize_for_json};
use crate::types::{RawEvent, RawEventData, WireEvent, REPLY_SCOPE};

/// Outcome of feeding one raw event.
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    /// Wire events to emit, in order.
    pub events: Vec<WireEvent>,
    /// Whether the conversation's `updated_at` should be bumped.
    pub touch: bool,
    /// Whether the stream ends after `events`.
    pub terminal: bool,
}

impl Step {
    fn emit(event: WireEvent) -> Self {
        Self {
            events: vec![event],
            ..Default::default()
        }
    }
}

/// Single-pass translator state: one text accumulator, the
/// "final already sent" flag and the names of tool calls still running.
#[derive(Debug, Default)]
pub struct TranslatorState {
    buffer: String,
    final_sent: bool,
    terminated: bool,
    running_tools: HashMap<String, String>,
}

impl TranslatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn final_sent(&self) -> bool {
        self.final_sent
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed one raw event.
    pub fn apply(&mut self, event: RawEvent) -> Step {
        if self.terminated {
            return Step::default();
        }
        let in_reply_scope = event.in_scope(REPLY_SCOPE);
        let named = event.name.is_some();
        let tool_name = event.tool_name();

        match event.data {
            RawEventData::ModelStreamChunk { chunk } if in_reply_scope => {
                let text = extract_text(&chunk);
                if text.is_empty() {
                    return Step::default();
                }
                self.buffer.push_str(&text);
                Step::emit(WireEvent::ResponseChunk { text })
            }
            RawEventData::ModelTurnEnd { output } if in_reply_scope => {
                let intermediate = output.as_ref().is_some_and(|o| o.has_tool_calls());
                if intermediate {
                    // The reply continues after the requested tools run.
                    self.buffer.clear();
                    return Step {
                        touch: true,
                        ..Default::default()
                    };
                }

                let own_text = output.as_ref().map(extract_text).unwrap_or_default();
                let buffered = std::mem::take(&mut self.buffer);
                let text = if own_text.trim().is_empty() { buffered } else { own_text };

                let mut step = Step {
                    touch: true,
                    ..Default::default()
                };
                if !self.final_sent && !text.trim().is_empty() {
                    step.events.push(WireEvent::FinalResponse { text });
                }
                self.final_sent = true;
                step
            }
            RawEventData::ToolStart { call_id, input } => {
                if let Some(id) = call_id {
                    self.running_tools.insert(id, tool_name.clone());
                }
                Step::emit(WireEvent::ToolCall {
                    tool_name,
                    input: normalize_for_json(&input),
                })
            }
            RawEventData::ToolEnd { call_id, output } => {
                // Results are matched to their start by call id, not arrival order.
                let started = call_id.and_then(|id| self.running_tools.remove(&id));
                let tool_name = match started {
                    Some(started) if !named => started,
                    _ => tool_name,
                };
                Step {
                    events: vec![WireEvent::ToolResult {
                        tool_name,
                        output: normalize_for_json(&output.into_content()),
                    }],
                    touch: true,
                    terminal: false,
                }
            }
            RawEventData::ChainError { message } => self.fail(message),
            other => {
                debug!(scope = ?event.scope, data = ?other, "ignoring event outside the reply scope");
                Step::default()
            }
        }
    }

    /// Terminate with an error.
    pub fn fail(&mut self, message: impl Into<String>) -> Step {
        if self.terminated {
            return Step::default();
        }
        self.terminated = true;
        Step {
            events: vec![WireEvent::Error {
                message: message.into(),
            }],
            touch: false,
            terminal: true,
        }
    }

    /// End of the raw stream: flush unsent text, then `done`. Flushing
    /// completes the model turn, so the step asks for a touch.
    pub fn finish(&mut self) -> Step {
        if self.terminated {
            return Step::default();
        }
        self.terminated = true;

        let mut step = Step {
            terminal: true,
            ..Default::default()
        };
        let buffered = std::mem::take(&mut self.buffer);
        if !self.final_sent && !buffered.trim().is_empty() {
            self.final_sent = true;
            step.touch = true;
            step.events.push(WireEvent::FinalResponse { text: buffered });
        }
        step.events.push(WireEvent::Done);
        step
    }
}
