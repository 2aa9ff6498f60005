//! Two-node agent graph: `chatbot` (model turn) and `tools`.
//!
//! The chatbot node streams one model turn. When the turn requests tools the
//! tools node runs them and control returns to the chatbot; a turn without
//! tool calls ends the run. Each node's new messages are appended to the
//! session store as one checkpoint.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::prompt::{build_system_prompt, BASE_SYSTEM_PROMPT};
use super::{AgentRuntime, RunConfig};
use crate::config::DEFAULT_MAX_STEPS;
use crate::error::Result;
use crate::memory::{MemoryStore, Namespace};
use crate::model::{ChatModel, ModelDelta, ModelRequest};
use crate::normalize::Payload;
use crate::session::SessionStore;
use crate::tools::{ToolArguments, ToolContext, ToolRegistry};
use crate::types::{
    AgentToolCall, GenerationSettings, ModelMessage, RawEvent, Role, Usage, REPLY_SCOPE,
};

/// Agent runtime driving a [`ChatModel`] and a [`ToolRegistry`] over
/// persisted session history.
#[derive(Clone)]
pub struct GraphAgent {
    model: Arc<dyn ChatModel>,
    sessions: Arc<dyn SessionStore>,
    memories: Option<Arc<dyn MemoryStore>>,
    tools: ToolRegistry,
    base_prompt: String,
    max_steps: usize,
    settings: GenerationSettings,
}

impl GraphAgent {
    pub fn new(model: Arc<dyn ChatModel>, sessions: Arc<dyn SessionStore>, tools: ToolRegistry) -> Self {
        Self {
            model,
            sessions,
            memories: None,
            tools,
            base_prompt: BASE_SYSTEM_PROMPT.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            settings: GenerationSettings::default(),
        }
    }

    /// Record exchanges in, and delete namespaces from, `store`.
    pub fn with_memory(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.memories = Some(store);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Replace the base system prompt (the user profile is still appended).
    pub fn with_base_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.base_prompt = prompt.into();
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn system_prompt(&self, config: &RunConfig) -> String {
        match config.system_prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => prompt.to_string(),
            _ => build_system_prompt(&self.base_prompt, config.user_profile.as_ref()),
        }
    }
}

impl std::fmt::Debug for GraphAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphAgent")
            .field("model", &self.model.model_id())
            .field("tools", &self.tools)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

#[async_trait]
impl AgentRuntime for GraphAgent {
    fn stream_events(
        &self,
        input: Vec<ModelMessage>,
        config: RunConfig,
    ) -> BoxStream<'static, Result<RawEvent>> {
        let agent = self.clone();
        let system = ModelMessage::system(agent.system_prompt(&config));

        let stream = async_stream::stream! {
            let thread_id = config.thread_id.clone();
            let mut history = match agent.sessions.get_state(&thread_id).await {
                Ok(history) => history,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            if let Err(e) = agent.sessions.append(&thread_id, &input).await {
                yield Err(e);
                return;
            }
            history.extend(input);

            let mut settings = agent.settings.clone();
            if settings.user.is_none() {
                settings.user = config.user_id.clone();
            }
            let tool_ctx = ToolContext {
                thread_id: thread_id.clone(),
                user_id: config.user_id.clone(),
            };

            let mut usage = Usage::default();
            for step in 0..agent.max_steps {
                debug!(thread_id = %thread_id, step, "chatbot step");

                // chatbot
                let mut messages = Vec::with_capacity(history.len() + 1);
                messages.push(system.clone());
                messages.extend(history.iter().cloned());
                let request = ModelRequest {
                    messages,
                    tools: agent.tools.definitions(),
                    settings: settings.clone(),
                };

                let mut deltas = match agent.model.stream(&request).await {
                    Ok(deltas) => deltas,
                    Err(e) => {
                        yield Ok(RawEvent::chain_error(e.to_string()));
                        return;
                    }
                };
                let mut text = String::new();
                let mut calls: Vec<AgentToolCall> = Vec::new();
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(ModelDelta::Text(chunk)) => {
                            text.push_str(&chunk);
                            yield Ok(RawEvent::chunk(REPLY_SCOPE, chunk));
                        }
                        Ok(ModelDelta::ToolCall(call)) => calls.push(call),
                        Ok(ModelDelta::Done { usage: Some(turn), .. }) => usage.merge(&turn),
                        Ok(ModelDelta::Done { .. }) => {}
                        Err(e) => {
                            yield Ok(RawEvent::chain_error(e.to_string()));
                            return;
                        }
                    }
                }

                let reply = if calls.is_empty() {
                    ModelMessage::assistant(text.clone())
                } else {
                    ModelMessage::assistant_with_tool_calls(text.clone(), calls.clone())
                };
                yield Ok(RawEvent::turn_end(REPLY_SCOPE, Some(Payload::Message(reply.clone()))));

                if let Err(e) = agent.sessions.append(&thread_id, std::slice::from_ref(&reply)).await {
                    yield Err(e);
                    return;
                }
                agent.remember_exchange(&config, &history, &text).await;
                history.push(reply);

                if calls.is_empty() {
                    debug!(thread_id = %thread_id, steps = step + 1, tokens = usage.total_tokens, "run complete");
                    return;
                }

                // tools
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    let call_id = (!call.id.is_empty()).then(|| call.id.clone());
                    yield Ok(RawEvent::tool_start(
                        call.name.clone(),
                        call_id.clone(),
                        call.arguments.clone(),
                    ));
                    let (output, is_error) = agent.run_tool(&call, &tool_ctx).await;
                    yield Ok(RawEvent::tool_end(call.name.clone(), call_id, output.clone()));
                    results.push(ModelMessage::tool_result(call.name, call.id, output, is_error));
                }
                if let Err(e) = agent.sessions.append(&thread_id, &results).await {
                    yield Err(e);
                    return;
                }
                history.extend(results);
            }

            yield Ok(RawEvent::chain_error(format!(
                "agent stopped after {} steps without a final reply",
                agent.max_steps
            )));
        };

        Box::pin(stream)
    }

    async fn get_state(&self, thread_id: &str) -> Result<Vec<ModelMessage>> {
        self.sessions.get_state(thread_id).await
    }

    async fn delete_state(&self, thread_id: &str) -> Result<()> {
        self.sessions.delete_state(thread_id).await
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        match &self.memories {
            Some(store) => store.delete_namespace(namespace).await.map(|_| ()),
            None => Ok(()),
        }
    }
}

impl GraphAgent {
    /// Execute one tool call. Unknown tools and tool failures become error
    /// results that are fed back to the model.
    async fn run_tool(&self, call: &AgentToolCall, ctx: &ToolContext) -> (Value, bool) {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return (json!(format!("Error: unknown tool '{}'", call.name)), true);
        };
        match tool.execute(&ToolArguments::new(call.arguments.clone()), ctx).await {
            Ok(output) => (output, false),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                (json!(format!("Error: {e}")), true)
            }
        }
    }

    /// Best-effort: store the latest user message and this turn's reply.
    async fn remember_exchange(&self, config: &RunConfig, history: &[ModelMessage], reply: &str) {
        let (Some(store), Some(user_id)) = (&self.memories, config.user_id.as_deref()) else {
            return;
        };
        if reply.trim().is_empty() {
            return;
        }
        let Some(last_user) = history.iter().rev().find(|m| m.role == Role::User) else {
            return;
        };

        let timestamp = Utc::now().timestamp_millis();
        let exchange = json!({
            "user": last_user.text(),
            "assistant": reply,
            "timestamp": timestamp,
        });
        let namespace = Namespace::conversation(user_id, &config.thread_id);
        if let Err(e) = store.put(&namespace, &format!("exchange_{timestamp}"), exchange).await {
            warn!(error = %e, namespace = %namespace, "memory write failed");
        }
    }
}
