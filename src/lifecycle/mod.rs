//! Agent lifecycle: single-flight construction and hot refresh.
//!
//! ```text
//! Uninitialized --get_agent--> Ready(0) --refresh--> Ready(1) ... --close--> Closed
//! ```
//!
//! Every transition holds one async mutex, so concurrent first callers wait
//! for a single build. Using an agent does not take the lock.

mod scope;
#[cfg(all(feature = "sqlite", feature = "openai"))]
mod sqlite;

pub use scope::{Closeable, ResourceScope};
#[cfg(all(feature = "sqlite", feature = "openai"))]
pub use sqlite::SqliteAgentFactory;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::agent::AgentRuntime;
use crate::error::{AtlasError, Result};

/// Message of the error surfaced when a refresh-and-retry also fails.
pub const WARMING_UP: &str = "service is warming up, retry shortly";

/// Builds an agent runtime, registering its backing resources in `scope`.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn build(&self, scope: &mut ResourceScope) -> Result<Arc<dyn AgentRuntime>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    /// Built; `generation` counts completed refreshes.
    Ready { generation: u64 },
    Closed,
}

struct Inner {
    agent: Option<Arc<dyn AgentRuntime>>,
    scope: ResourceScope,
    generation: u64,
    closed: bool,
}

/// Owns the agent runtime and the resources behind it.
pub struct AgentManager {
    factory: Arc<dyn AgentFactory>,
    inner: Mutex<Inner>,
    refreshes: AtomicU64,
}

impl AgentManager {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            inner: Mutex::new(Inner {
                agent: None,
                scope: ResourceScope::new(),
                generation: 0,
                closed: false,
            }),
            refreshes: AtomicU64::new(0),
        }
    }

    /// The current agent, building it on first use.
    pub async fn get_agent(&self) -> Result<Arc<dyn AgentRuntime>> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(closed_error());
        }
        if let Some(agent) = &inner.agent {
            return Ok(agent.clone());
        }
        let agent = self.build_locked(&mut inner).await?;
        info!(generation = inner.generation, "agent ready");
        Ok(agent)
    }

    /// Tear down the current resources and build fresh ones.
    pub async fn refresh(&self) -> Result<Arc<dyn AgentRuntime>> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(closed_error());
        }
        let had_agent = inner.agent.take().is_some();
        inner.scope.close().await;
        let agent = self.build_locked(&mut inner).await?;
        if had_agent {
            inner.generation += 1;
        }
        info!(generation = inner.generation, "agent refreshed");
        Ok(agent)
    }

    /// Release every resource. Safe to call more than once.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.agent = None;
        let failures = inner.scope.close().await;
        inner.closed = true;
        info!(failures, "agent manager closed");
    }

    pub async fn state(&self) -> LifecycleState {
        let inner = self.inner.lock().await;
        match (inner.closed, &inner.agent) {
            (true, _) => LifecycleState::Closed,
            (false, None) => LifecycleState::Uninitialized,
            (false, Some(_)) => LifecycleState::Ready {
                generation: inner.generation,
            },
        }
    }

    /// Number of `refresh` calls so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Run `op` against the agent. If it fails with a stale connection,
    /// refresh once and retry once; if that also fails, report
    /// [`AtlasError::ServiceUnavailable`]. Other errors pass through.
    pub async fn with_refresh_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn AgentRuntime>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let agent = self.get_agent().await?;
        let err = match op(agent).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_stale_connection() => e,
            Err(e) => return Err(e),
        };

        warn!(error = %err, "stale backend connection; refreshing agent");
        let agent = match self.refresh().await {
            Ok(agent) => agent,
            Err(e) => {
                warn!(error = %e, "agent refresh failed");
                return Err(AtlasError::ServiceUnavailable(WARMING_UP.to_string()));
            }
        };
        op(agent).await.map_err(|e| {
            warn!(error = %e, "retry after refresh failed");
            AtlasError::ServiceUnavailable(WARMING_UP.to_string())
        })
    }

    async fn build_locked(&self, inner: &mut Inner) -> Result<Arc<dyn AgentRuntime>> {
        match self.factory.build(&mut inner.scope).await {
            Ok(agent) => {
                inner.agent = Some(agent.clone());
                Ok(agent)
            }
            Err(e) => {
                // Release whatever the failed build managed to open.
                inner.scope.close().await;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for AgentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentManager")
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}

fn closed_error() -> AtlasError {
    AtlasError::InvalidState("agent manager is closed".to_string())
}
