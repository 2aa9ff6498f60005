//! OpenAI-compatible Chat Completions streaming adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::http::{bearer_headers, build_client, parse_sse_data, status_to_error};
use super::{ChatModel, ModelDelta, ModelRequest};
use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};
use crate::types::{AgentToolCall, ContentPart, FinishReason, ModelMessage, Role, Usage};

pub struct OpenAiChatModel {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client()?,
        })
    }

    /// Build from settings. A missing API key is a configuration error.
    pub fn from_config(config: &AtlasConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AtlasError::Configuration("OPENAI_API_KEY is not set".into()))?;
        Self::new(&config.model, api_key, &config.openai_base_url)
    }

    fn build_request_body(&self, request: &ModelRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), self.model.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("stream".into(), true.into());
        body.insert("stream_options".into(), json!({"include_usage": true}));

        let settings = &request.settings;
        if let Some(max) = settings.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(seed) = settings.seed {
            body.insert("seed".into(), seed.into());
        }
        if let Some(ref user) = settings.user {
            body.insert("user".into(), user.clone().into());
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tool_defs.into());
        }

        Value::Object(body)
    }
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: &ModelRequest) -> Result<BoxStream<'static, Result<ModelDelta>>> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, tools = request.tools.len(), "OpenAI stream");

        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        Ok(sse_deltas(resp.bytes_stream()))
    }
}

/// Parse an SSE byte stream into model deltas.
///
/// Bytes are buffered until a full line arrives and only complete lines are
/// decoded, so a multi-byte character split across network chunks survives.
fn sse_deltas<S, B>(byte_stream: S) -> BoxStream<'static, Result<ModelDelta>>
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut calls = ToolCallAccumulator::default();
        let mut finish: Option<FinishReason> = None;
        let mut usage: Option<Usage> = None;
        futures::pin_mut!(byte_stream);

        'read: while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(AtlasError::Network(e));
                    return;
                }
            };

            buffer.extend_from_slice(chunk.as_ref());

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = match std::str::from_utf8(&raw) {
                    Ok(line) => line.trim(),
                    Err(e) => {
                        debug!(error = %e, "skipping stream line with invalid UTF-8");
                        continue;
                    }
                };

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if line == "data: [DONE]" || line == "data:[DONE]" {
                    break 'read;
                }
                let Some(data) = parse_sse_data(line) else {
                    continue;
                };
                let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!(error = %e, "skipping unparseable stream chunk");
                        continue;
                    }
                };

                if let Some(u) = chunk.usage {
                    usage = Some(u.into());
                }
                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        yield Ok(ModelDelta::Text(text));
                    }
                    for delta in choice.delta.tool_calls.unwrap_or_default() {
                        calls.push(delta);
                    }
                    if let Some(reason) = choice.finish_reason.as_deref() {
                        finish = parse_finish_reason(reason);
                        for call in calls.drain() {
                            yield Ok(ModelDelta::ToolCall(call));
                        }
                    }
                }
            }
        }

        for call in calls.drain() {
            yield Ok(ModelDelta::ToolCall(call));
        }
        yield Ok(ModelDelta::Done { finish_reason: finish, usage });
    };

    Box::pin(stream)
}

/// Assembles streamed tool-call fragments keyed by their `index`.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    partial: BTreeMap<u32, PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn push(&mut self, delta: OpenAiToolCallDelta) {
        let entry = self.partial.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            entry.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(args) = function.arguments {
                entry.arguments.push_str(&args);
            }
        }
    }

    fn drain(&mut self) -> Vec<AgentToolCall> {
        std::mem::take(&mut self.partial)
            .into_values()
            .map(|call| AgentToolCall {
                id: call.id,
                name: call.name,
                arguments: parse_arguments(&call.arguments),
            })
            .collect()
    }
}

fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    s.parse().ok()
}

fn message_to_openai(msg: &ModelMessage) -> Value {
    match msg.role {
        Role::Tool => {
            let result = msg.tool_results().into_iter().next();
            let content = result
                .map(|r| match &r.result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default();
            json!({
                "role": "tool",
                "tool_call_id": result.map(|r| r.tool_call_id.clone()).unwrap_or_default(),
                "content": content,
            })
        }
        Role::Assistant if msg.has_tool_calls() => {
            let tool_calls: Vec<Value> = msg
                .content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::ToolCall(tc) => Some(json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();
            let text = msg.text();
            json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                "tool_calls": tool_calls,
            })
        }
        role => {
            let role = match role {
                Role::System => "system",
                Role::User => "user",
                _ => "assistant",
            };
            json!({ "role": role, "content": msg.text() })
        }
    }
}

// Wire types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}
