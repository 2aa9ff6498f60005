//! Shared test helpers: scripted model and runtime, flaky stores, counting factory.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde_json::json;

use atlas::agent::{AgentRuntime, GraphAgent, RunConfig};
use atlas::config::AtlasConfig;
use atlas::error::{AtlasError, Result};
use atlas::ledger::{ConversationLedger, MemoryLedger};
use atlas::lifecycle::{AgentFactory, AgentManager, Closeable, ResourceScope};
use atlas::memory::Namespace;
use atlas::model::{ChatModel, ModelDelta, ModelRequest};
use atlas::service::AppContext;
use atlas::session::{Checkpoint, MemorySessionStore, SessionStore};
use atlas::tools::{AgentTool, AgentToolParameters, Tool, ToolRegistry};
use atlas::types::{
    AgentToolCall, ConversationId, ConversationSummary, FinishReason, ModelMessage, OwnerId,
    RawEvent,
};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A chat model that replays queued turns.
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Vec<ModelDelta>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text turn streamed as `chunks`.
    pub fn queue_text(&self, chunks: &[&str]) {
        let mut deltas: Vec<ModelDelta> = chunks
            .iter()
            .map(|chunk| ModelDelta::Text(chunk.to_string()))
            .collect();
        deltas.push(ModelDelta::Done {
            finish_reason: Some(FinishReason::Stop),
            usage: None,
        });
        self.turns.lock().unwrap().push_back(deltas);
    }

    /// Queue a turn that requests one tool call.
    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) {
        self.turns.lock().unwrap().push_back(vec![
            ModelDelta::ToolCall(AgentToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: args,
            }),
            ModelDelta::Done {
                finish_reason: Some(FinishReason::ToolCalls),
                usage: None,
            },
        ]);
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &ModelRequest) -> Result<BoxStream<'static, Result<ModelDelta>>> {
        self.requests.lock().unwrap().push(request.clone());
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AtlasError::api(500, "no scripted turn left"))?;
        Ok(Box::pin(stream::iter(turn.into_iter().map(Ok))))
    }
}

/// Weather lookup used by the chat scenarios.
pub fn location_weather_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "location_weather_tool",
        "Current weather for a location",
        AgentToolParameters::object()
            .string("location", "City name", true)
            .build(),
        |args, _ctx| async move {
            let location = args.get_str("location")?;
            Ok(json!({"location": location, "forecast": "sunny", "temperature_c": 21}))
        },
    ))
}

/// A [`GraphAgent`] over in-memory sessions with the weather tool bound.
pub fn weather_agent(model: Arc<ScriptedModel>, sessions: Arc<dyn SessionStore>) -> GraphAgent {
    GraphAgent::new(model, sessions, ToolRegistry::new().with(location_weather_tool()))
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// An agent runtime that replays a fixed event script.
pub struct ScriptedRuntime {
    sessions: Arc<dyn SessionStore>,
    script: Vec<RawEvent>,
    failure: Option<String>,
    stale: bool,
}

impl ScriptedRuntime {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions,
            script: Vec::new(),
            failure: None,
            stale: false,
        }
    }

    pub fn with_script(mut self, script: Vec<RawEvent>) -> Self {
        self.script = script;
        self
    }

    /// End the script with an `Err` item.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Every state access fails with a closed connection.
    pub fn stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }

    fn check(&self) -> Result<()> {
        if self.stale {
            return Err(AtlasError::ConnectionClosed("state pool closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    fn stream_events(
        &self,
        _input: Vec<ModelMessage>,
        _config: RunConfig,
    ) -> BoxStream<'static, Result<RawEvent>> {
        let mut items: Vec<Result<RawEvent>> = self.script.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.failure {
            items.push(Err(AtlasError::Stream(message.clone())));
        }
        Box::pin(stream::iter(items))
    }

    async fn get_state(&self, thread_id: &str) -> Result<Vec<ModelMessage>> {
        self.check()?;
        self.sessions.get_state(thread_id).await
    }

    async fn delete_state(&self, thread_id: &str) -> Result<()> {
        self.check()?;
        self.sessions.delete_state(thread_id).await
    }

    async fn delete_namespace(&self, _namespace: &Namespace) -> Result<()> {
        self.check()
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Session store whose first `stale_reads` reads fail with a closed connection.
pub struct FlakySessionStore {
    inner: MemorySessionStore,
    stale_reads: AtomicUsize,
}

impl FlakySessionStore {
    pub fn new(stale_reads: usize) -> Self {
        Self {
            inner: MemorySessionStore::new(),
            stale_reads: AtomicUsize::new(stale_reads),
        }
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn append(&self, thread_id: &str, messages: &[ModelMessage]) -> Result<Checkpoint> {
        self.inner.append(thread_id, messages).await
    }

    async fn get_state(&self, thread_id: &str) -> Result<Vec<ModelMessage>> {
        let remaining = self.stale_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.stale_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(AtlasError::ConnectionClosed("server closed the connection".into()));
        }
        self.inner.get_state(thread_id).await
    }

    async fn get_state_at(&self, thread_id: &str, seq: u64) -> Result<Vec<ModelMessage>> {
        self.inner.get_state_at(thread_id, seq).await
    }

    async fn list_checkpoints(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        self.inner.list_checkpoints(thread_id).await
    }

    async fn delete_state(&self, thread_id: &str) -> Result<()> {
        self.inner.delete_state(thread_id).await
    }
}

/// Ledger wrapper counting touches; optionally failing them.
pub struct CountingLedger {
    inner: MemoryLedger,
    pub touches: AtomicUsize,
    fail_touch: bool,
}

impl CountingLedger {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedger::default(),
            touches: AtomicUsize::new(0),
            fail_touch: false,
        }
    }

    pub fn failing_touch() -> Self {
        Self {
            fail_touch: true,
            ..Self::new()
        }
    }

    pub fn touch_count(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationLedger for CountingLedger {
    fn default_title(&self) -> &str {
        self.inner.default_title()
    }

    async fn ensure(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
        title: Option<&str>,
    ) -> Result<ConversationSummary> {
        self.inner.ensure(id, owner, title).await
    }

    async fn maybe_update_title(&self, id: ConversationId, text: &str) -> Result<()> {
        self.inner.maybe_update_title(id, text).await
    }

    async fn touch(&self, id: ConversationId) -> Result<()> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        if self.fail_touch {
            return Err(AtlasError::Storage("ledger unavailable".into()));
        }
        self.inner.touch(id).await
    }

    async fn get(
        &self,
        id: ConversationId,
        owner: Option<OwnerId>,
    ) -> Result<Option<ConversationSummary>> {
        self.inner.get(id, owner).await
    }

    async fn list(&self, owner: Option<OwnerId>) -> Result<Vec<ConversationSummary>> {
        self.inner.list(owner).await
    }

    async fn delete(&self, id: ConversationId, owner: Option<OwnerId>) -> Result<bool> {
        self.inner.delete(id, owner).await
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Resource that counts how often it was closed.
pub struct CountingResource(pub Arc<AtomicUsize>);

#[async_trait]
impl Closeable for CountingResource {
    async fn close(&self) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out [`ScriptedRuntime`]s over one shared session store.
pub struct CountingFactory {
    builds: AtomicUsize,
    closes: Arc<AtomicUsize>,
    sessions: Arc<dyn SessionStore>,
    script: Vec<RawEvent>,
    stale_builds: usize,
    fail_builds_after: Option<usize>,
    build_delay: Duration,
}

impl CountingFactory {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            builds: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            sessions,
            script: Vec::new(),
            stale_builds: 0,
            fail_builds_after: None,
            build_delay: Duration::ZERO,
        }
    }

    pub fn with_script(mut self, script: Vec<RawEvent>) -> Self {
        self.script = script;
        self
    }

    /// The first `n` built runtimes report stale connections.
    pub fn stale_for(mut self, n: usize) -> Self {
        self.stale_builds = n;
        self
    }

    /// Builds after the first `n` fail.
    pub fn fail_builds_after(mut self, n: usize) -> Self {
        self.fail_builds_after = Some(n);
        self
    }

    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentFactory for CountingFactory {
    async fn build(&self, scope: &mut ResourceScope) -> Result<Arc<dyn AgentRuntime>> {
        let n = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }
        if self.fail_builds_after.is_some_and(|limit| n > limit) {
            return Err(AtlasError::ConnectionClosed("database unreachable".into()));
        }
        scope.register("state", Arc::new(CountingResource(self.closes.clone())));
        Ok(Arc::new(
            ScriptedRuntime::new(self.sessions.clone())
                .with_script(self.script.clone())
                .stale(n <= self.stale_builds),
        ))
    }
}

/// Factory that always returns the same runtime.
pub struct FixedFactory(pub Arc<dyn AgentRuntime>);

#[async_trait]
impl AgentFactory for FixedFactory {
    async fn build(&self, _scope: &mut ResourceScope) -> Result<Arc<dyn AgentRuntime>> {
        Ok(self.0.clone())
    }
}

/// App context over `ledger` and an agent manager using `factory`.
pub fn app_context(
    ledger: Arc<dyn ConversationLedger>,
    factory: Arc<dyn AgentFactory>,
) -> AppContext {
    AppContext::new(
        AtlasConfig::default(),
        ledger,
        Arc::new(AgentManager::new(factory)),
    )
}
