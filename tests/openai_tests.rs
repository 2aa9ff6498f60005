//! OpenAI-compatible streaming model against a mock server.

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atlas::error::AtlasError;
use atlas::model::{ChatModel, ModelDelta, ModelRequest, OpenAiChatModel};
use atlas::tools::ToolDefinition;
use atlas::types::{FinishReason, ModelMessage};

fn sse(lines: &[serde_json::Value]) -> String {
    let mut body = String::new();
    for line in lines {
        body.push_str(&format!("data: {line}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn request(text: &str) -> ModelRequest {
    ModelRequest {
        messages: vec![ModelMessage::system("be brief"), ModelMessage::user(text)],
        ..Default::default()
    }
}

async fn collect(model: &OpenAiChatModel, request: &ModelRequest) -> Vec<ModelDelta> {
    model
        .stream(request)
        .await
        .unwrap()
        .map(|delta| delta.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn streams_text_deltas_then_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("\"stream\":true"))
        .respond_with(sse_response(sse(&[
            json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "It is "}}]}),
            json!({"choices": [{"index": 0, "delta": {"content": "sunny."}, "finish_reason": "stop"}]}),
            json!({"choices": [], "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}}),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new("gpt-4o", "sk-test", server.uri()).unwrap();
    let deltas = collect(&model, &request("weather?")).await;

    assert_eq!(deltas[0], ModelDelta::Text("It is ".into()));
    assert_eq!(deltas[1], ModelDelta::Text("sunny.".into()));
    match &deltas[2] {
        ModelDelta::Done { finish_reason, usage } => {
            assert_eq!(*finish_reason, Some(FinishReason::Stop));
            assert_eq!(usage.as_ref().map(|u| u.total_tokens), Some(15));
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

#[tokio::test]
async fn assembles_fragmented_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("location_weather_tool"))
        .respond_with(sse_response(sse(&[
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "id": "call_1", "type": "function",
                 "function": {"name": "location_weather_tool", "arguments": "{\"loc"}}
            ]}}]}),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "ation\":\"Paris\"}"}}
            ]}, "finish_reason": "tool_calls"}]}),
        ])))
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new("gpt-4o", "sk-test", server.uri()).unwrap();
    let mut req = request("weather in Paris?");
    req.tools = vec![ToolDefinition {
        name: "location_weather_tool".into(),
        description: "Weather lookup".into(),
        parameters: json!({"type": "object", "properties": {"location": {"type": "string"}}}),
    }];
    let deltas = collect(&model, &req).await;

    match &deltas[0] {
        ModelDelta::ToolCall(call) => {
            assert_eq!(call.id, "call_1");
            assert_eq!(call.name, "location_weather_tool");
            assert_eq!(call.arguments, json!({"location": "Paris"}));
        }
        other => panic!("expected ToolCall, got {other:?}"),
    }
    assert!(matches!(
        deltas.last(),
        Some(ModelDelta::Done { finish_reason: Some(FinishReason::ToolCalls), .. })
    ));
}

#[tokio::test]
async fn http_errors_map_to_typed_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new("gpt-4o", "sk-bad", server.uri()).unwrap();
    let err = match model.stream(&request("hi")).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error"),
    };
    assert!(matches!(err, AtlasError::Authentication(ref body) if body == "invalid api key"));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    let model = OpenAiChatModel::new("gpt-4o", "sk-test", "http://127.0.0.1:9").unwrap();
    let err = match model.stream(&request("hi")).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error"),
    };
    assert!(matches!(err, AtlasError::Network(_)));
    assert!(err.is_retryable());
}
