//! Agent lifecycle: single-flight build, refresh-and-retry, close.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use atlas::error::AtlasError;
use atlas::ledger::MemoryLedger;
use atlas::lifecycle::{AgentManager, LifecycleState, WARMING_UP};
use atlas::service::Caller;
use atlas::session::{MemorySessionStore, SessionStore};
use atlas::types::ModelMessage;

use common::{app_context, CountingFactory, FixedFactory, FlakySessionStore, ScriptedRuntime};

#[tokio::test]
async fn concurrent_first_callers_share_one_build() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(
        CountingFactory::new(sessions).with_build_delay(Duration::from_millis(20)),
    );
    let manager = Arc::new(AgentManager::new(factory.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_agent().await.map(|_| ()) })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(factory.build_count(), 1);
    assert_eq!(manager.state().await, LifecycleState::Ready { generation: 0 });
}

#[tokio::test]
async fn refresh_replaces_resources_and_bumps_generation() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(CountingFactory::new(sessions));
    let manager = AgentManager::new(factory.clone());

    assert_eq!(manager.state().await, LifecycleState::Uninitialized);
    manager.get_agent().await.unwrap();
    manager.refresh().await.unwrap();

    assert_eq!(factory.build_count(), 2);
    assert_eq!(factory.close_count(), 1);
    assert_eq!(manager.refresh_count(), 1);
    assert_eq!(manager.state().await, LifecycleState::Ready { generation: 1 });
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(CountingFactory::new(sessions));
    let manager = AgentManager::new(factory.clone());
    manager.get_agent().await.unwrap();

    manager.close().await;
    manager.close().await;

    assert_eq!(factory.close_count(), 1);
    assert_eq!(manager.state().await, LifecycleState::Closed);
    assert!(matches!(manager.get_agent().await, Err(AtlasError::InvalidState(_))));
}

#[tokio::test]
async fn stale_history_read_refreshes_exactly_once_then_succeeds() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(CountingFactory::new(sessions.clone()).stale_for(1));
    let ctx = app_context(Arc::new(MemoryLedger::default()), factory.clone());
    let caller = Caller::user(Uuid::new_v4());
    let created = ctx.conversations().create(&caller, None).await.unwrap();
    sessions
        .append(&created.id.to_string(), &[ModelMessage::user("still there?")])
        .await
        .unwrap();

    let detail = ctx.conversations().get(&caller, created.id).await.unwrap();

    assert_eq!(detail.messages.len(), 1);
    assert_eq!(ctx.agents.refresh_count(), 1);
    assert_eq!(factory.build_count(), 2);
}

#[tokio::test]
async fn stale_store_behind_a_single_runtime_recovers_on_retry() {
    let flaky = Arc::new(FlakySessionStore::new(1));
    flaky.append("t-1", &[ModelMessage::user("hello")]).await.unwrap();
    let runtime = Arc::new(ScriptedRuntime::new(flaky));
    let manager = AgentManager::new(Arc::new(FixedFactory(runtime)));

    let messages = manager
        .with_refresh_retry(|agent| async move { agent.get_state("t-1").await })
        .await
        .unwrap();

    assert_eq!(messages.len(), 1);
    assert_eq!(manager.refresh_count(), 1);
}

#[tokio::test]
async fn failed_retry_reports_warming_up() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(CountingFactory::new(sessions).stale_for(usize::MAX));
    let ctx = app_context(Arc::new(MemoryLedger::default()), factory.clone());
    let caller = Caller::anonymous();
    let created = ctx.conversations().create(&caller, None).await.unwrap();

    let err = ctx.conversations().get(&caller, created.id).await.unwrap_err();

    match &err {
        AtlasError::ServiceUnavailable(message) => assert_eq!(message, WARMING_UP),
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
    assert_eq!(err.status_code(), 503);
    assert!(err.is_retryable());
    assert_eq!(ctx.agents.refresh_count(), 1);
}

#[tokio::test]
async fn failed_refresh_reports_warming_up() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(
        CountingFactory::new(sessions)
            .stale_for(1)
            .fail_builds_after(1),
    );
    let manager = AgentManager::new(factory.clone());

    let err = manager
        .with_refresh_retry(|agent| async move { agent.get_state("t").await })
        .await
        .unwrap_err();

    assert!(matches!(err, AtlasError::ServiceUnavailable(_)));
    assert_eq!(manager.refresh_count(), 1);
    assert_eq!(factory.build_count(), 2);
}

#[tokio::test]
async fn non_stale_errors_are_not_retried() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(CountingFactory::new(sessions));
    let manager = AgentManager::new(factory.clone());

    let err = manager
        .with_refresh_retry(|_agent| async move {
            Err::<(), _>(AtlasError::InvalidArgument("bad thread".into()))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AtlasError::InvalidArgument(_)));
    assert_eq!(manager.refresh_count(), 0);
}

#[tokio::test]
async fn shutdown_closes_agent_resources() {
    let sessions = Arc::new(MemorySessionStore::new());
    let factory = Arc::new(CountingFactory::new(sessions));
    let ctx = app_context(Arc::new(MemoryLedger::default()), factory.clone());
    ctx.agents.get_agent().await.unwrap();

    ctx.shutdown().await;
    ctx.shutdown().await;

    assert_eq!(factory.close_count(), 1);
    assert_eq!(ctx.agents.state().await, LifecycleState::Closed);
}
