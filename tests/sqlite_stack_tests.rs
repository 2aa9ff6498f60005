//! Full stack: SQLite ledger and agent state, OpenAI model on a mock server.

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atlas::config::AtlasConfig;
use atlas::error::AtlasError;
use atlas::service::{AppContext, Caller};
use atlas::types::{ChatRequest, ToolStatus, WireEvent, WireFrame};

fn sse(chunks: &[serde_json::Value]) -> ResponseTemplate {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn text_reply(text: &str) -> ResponseTemplate {
    sse(&[json!({"choices": [{"index": 0, "delta": {"content": text}, "finish_reason": "stop"}]})])
}

async fn mount_model(server: &MockServer) {
    // after a tool result: answer from it
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(text_reply("You are planning a trip to Rome."))
        .with_priority(1)
        .mount(server)
        .await;
    // recall questions: look up memories first
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Which trip"))
        .respond_with(sse(&[json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": "call_mem", "type": "function",
             "function": {"name": "memory_retriever", "arguments": "{\"query\":\"Rome\"}"}}
        ]}, "finish_reason": "tool_calls"}]})]))
        .with_priority(2)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(text_reply("Noted!"))
        .mount(server)
        .await;
}

fn config(dir: &TempDir, server: &MockServer) -> AtlasConfig {
    AtlasConfig::builder()
        .database_path(dir.path().join("atlas.db"))
        .state_path(dir.path().join("agent-state.db"))
        .openai_api_key("sk-test")
        .openai_base_url(server.uri())
        .build()
}

async fn chat(ctx: &AppContext, caller: &Caller, request: ChatRequest) -> Vec<WireFrame> {
    ctx.chat().stream_responses(caller, request).collect().await
}

#[tokio::test]
async fn memories_from_one_conversation_are_recalled_in_another() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_model(&server).await;
    let ctx = AppContext::open(config(&dir, &server)).unwrap();
    let caller = Caller::user(Uuid::new_v4());

    let first = chat(&ctx, &caller, ChatRequest::new("I'm planning a trip to Rome")).await;
    assert_eq!(first.last().map(|f| &f.event), Some(&WireEvent::Done));

    let second = chat(&ctx, &caller, ChatRequest::new("Which trip am I planning?")).await;
    let tool_results: Vec<&serde_json::Value> = second
        .iter()
        .filter_map(|f| match &f.event {
            WireEvent::ToolResult { tool_name, output } if tool_name == "memory_retriever" => Some(output),
            _ => None,
        })
        .collect();
    assert_eq!(tool_results.len(), 1);
    assert_eq!(tool_results[0]["results"][0]["user"], "I'm planning a trip to Rome");
    assert!(second.iter().any(|f| f.event
        == WireEvent::FinalResponse { text: "You are planning a trip to Rome.".into() }));
    assert_eq!(second.last().map(|f| &f.event), Some(&WireEvent::Done));

    let listed = ctx.conversations().list(&caller).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].title, "Which trip am I planning?");

    let id = Uuid::parse_str(&second[0].checkpoint_id).unwrap();
    let detail = ctx.conversations().get(&caller, id).await.unwrap();
    let roles: Vec<_> = detail.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles.len(), 3);
    assert_eq!(detail.messages[1].tool_status, Some(ToolStatus::Complete));
    assert_eq!(detail.messages[2].content, "You are planning a trip to Rome.");

    ctx.shutdown().await;
}

#[tokio::test]
async fn conversations_persist_across_restarts_and_deletes_cascade() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_model(&server).await;
    let caller = Caller::user(Uuid::new_v4());

    let id = {
        let ctx = AppContext::open(config(&dir, &server)).unwrap();
        let frames = chat(&ctx, &caller, ChatRequest::new("hello")).await;
        ctx.shutdown().await;
        Uuid::parse_str(&frames[0].checkpoint_id).unwrap()
    };

    let ctx = AppContext::open(config(&dir, &server)).unwrap();
    let detail = ctx.conversations().get(&caller, id).await.unwrap();
    let contents: Vec<&str> = detail.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "Noted!"]);

    ctx.conversations().delete(&caller, id).await.unwrap();
    let err = ctx.conversations().get(&caller, id).await.unwrap_err();
    assert!(matches!(err, AtlasError::NotFound(_)));

    // a new conversation reusing nothing from the deleted thread
    let frames = chat(&ctx, &caller, ChatRequest::new("hello again").with_checkpoint(id.to_string())).await;
    assert_eq!(frames.last().map(|f| &f.event), Some(&WireEvent::Done));
    let detail = ctx.conversations().get(&caller, id).await.unwrap();
    assert_eq!(detail.messages.len(), 2);

    ctx.shutdown().await;
}

#[tokio::test]
async fn missing_api_key_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let config = AtlasConfig::builder()
        .database_path(dir.path().join("atlas.db"))
        .state_path(dir.path().join("agent-state.db"))
        .build();

    let err = AppContext::open(config).unwrap_err();
    assert!(matches!(err, AtlasError::Configuration(_)));
}
