//! Tests for core types.

use pretty_assertions::assert_eq;
use serde_json::json;

use atlas::types::*;

#[test]
fn model_message_constructors() {
    let system = ModelMessage::system("be helpful");
    assert_eq!(system.role, Role::System);
    assert_eq!(system.text(), "be helpful");

    let user = ModelMessage::user("hi");
    assert_eq!(user.role, Role::User);
    assert!(!user.has_tool_calls());
}

#[test]
fn model_message_tool_result() {
    let msg = ModelMessage::tool_result("search", "call-1", json!({"hits": 2}), false);
    assert_eq!(msg.role, Role::Tool);
    assert_eq!(msg.name.as_deref(), Some("search"));
    let results = msg.tool_results();
    assert_eq!(results[0].tool_call_id, "call-1");
    assert!(!results[0].is_error);
}

#[test]
fn model_message_serde_roundtrip() {
    let msg = ModelMessage::assistant_with_tool_calls(
        "checking",
        vec![AgentToolCall {
            id: "c1".into(),
            name: "location_weather_tool".into(),
            arguments: json!({"location": "Paris"}),
        }],
    );
    let encoded = serde_json::to_string(&msg).unwrap();
    let decoded: ModelMessage = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, msg);
    assert_eq!(decoded.tool_calls()[0].name, "location_weather_tool");
}

#[test]
fn usage_merge() {
    let mut total = Usage {
        input_tokens: 10,
        output_tokens: 20,
        total_tokens: 30,
    };
    total.merge(&Usage {
        input_tokens: 5,
        output_tokens: 10,
        total_tokens: 15,
    });
    assert_eq!(total.input_tokens, 15);
    assert_eq!(total.total_tokens, 45);
}

#[test]
fn generation_settings_builder() {
    let settings = GenerationSettings::builder()
        .max_tokens(256)
        .temperature(0.2)
        .build();
    assert_eq!(settings.max_tokens, Some(256));
    assert_eq!(settings.temperature, Some(0.2));
    assert!(settings.user.is_none());
}

#[test]
fn finish_reason_display() {
    assert_eq!(FinishReason::ToolCalls.to_string(), "tool_calls");
    assert_eq!("stop".parse::<FinishReason>().unwrap(), FinishReason::Stop);
}

#[test]
fn wire_events_serialize_with_type_tags() {
    let frame = WireFrame::new(
        "c-1",
        WireEvent::ToolResult {
            tool_name: "location_weather_tool".into(),
            output: json!({"forecast": "sunny"}),
        },
    );
    assert_eq!(
        serde_json::to_value(&frame).unwrap(),
        json!({
            "type": "tool_result",
            "tool_name": "location_weather_tool",
            "output": {"forecast": "sunny"},
            "checkpoint_id": "c-1",
        })
    );
    assert_eq!(
        serde_json::to_value(WireFrame::new("c-1", WireEvent::Done)).unwrap(),
        json!({"type": "done", "checkpoint_id": "c-1"})
    );
    assert!(WireEvent::Error { message: "x".into() }.is_terminal());
    assert!(!WireEvent::Checkpoint.is_terminal());
}

#[test]
fn chat_request_accepts_null_checkpoint() {
    let request: ChatRequest =
        serde_json::from_value(json!({"message": "hi", "checkpoint_id": null})).unwrap();
    assert_eq!(request.message, "hi");
    assert!(request.checkpoint_id.is_none());

    let request: ChatRequest = serde_json::from_value(json!({"message": "hi"})).unwrap();
    assert!(request.checkpoint_id.is_none());
}

#[test]
fn conversation_detail_flattens_summary() {
    let now = chrono::Utc::now();
    let id = uuid::Uuid::new_v4();
    let detail = ConversationDetail {
        summary: ConversationSummary {
            id,
            owner_id: None,
            title: "New Chat".into(),
            created_at: now,
            updated_at: now,
        },
        messages: vec![ConversationMessage::user("hi")],
    };
    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(value["id"], json!(id));
    assert_eq!(value["title"], "New Chat");
    assert_eq!(value["messages"][0]["kind"], "message");
    assert_eq!(value["messages"][0]["role"], "user");
}
