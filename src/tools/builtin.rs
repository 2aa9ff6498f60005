//! Built-in tools backed by the crate's own stores.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::AtlasError;
use crate::memory::{MemoryItem, MemoryStore, Namespace};
use crate::tools::tool::{AgentTool, Tool, ToolContext};
use crate::tools::types::AgentToolParameters;

pub const MEMORY_RETRIEVER: &str = "memory_retriever";

const DEFAULT_LIMIT: u64 = 3;
const SUMMARY_MAX_CHARS: usize = 320;

/// Create the `memory_retriever` tool: recalls earlier exchanges of the
/// calling user across all of their conversations.
pub fn memory_retriever_tool(store: Arc<dyn MemoryStore>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        MEMORY_RETRIEVER,
        "Recall relevant details from past conversations with this user",
        AgentToolParameters::object()
            .string("query", "What to look for in past conversations", true)
            .integer("limit", "Maximum number of memories to return", false)
            .build(),
        move |args, ctx: ToolContext| {
            let store = store.clone();
            async move {
                let query = args.get_str("query")?.to_string();
                let limit = args.get_u64_or("limit", DEFAULT_LIMIT) as usize;
                let user_id = ctx.user_id.ok_or_else(|| AtlasError::ToolExecution {
                    tool_name: MEMORY_RETRIEVER.into(),
                    message: "no user is associated with this conversation".into(),
                })?;

                let items = store
                    .search(&Namespace::user_memories(&user_id), &query, limit)
                    .await?;
                if items.is_empty() {
                    return Ok(json!({
                        "results": [],
                        "message": "No relevant past memories found.",
                    }));
                }
                let results: Vec<Value> = items.iter().map(format_memory).collect();
                Ok(json!({ "results": results }))
            }
        },
    ))
}

fn format_memory(item: &MemoryItem) -> Value {
    let field = |name: &str| {
        item.value
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let user = field("user");
    let assistant = field("assistant");
    let summary = match (&user, &assistant) {
        (Some(u), Some(a)) => shorten(&format!("{u}\n{a}")),
        (Some(text), None) | (None, Some(text)) => shorten(text),
        (None, None) => shorten(&item.value.to_string()),
    };

    let mut entry = serde_json::Map::new();
    if let Some(ts) = item.value.get("timestamp") {
        entry.insert("timestamp".into(), ts.clone());
    }
    if let Some(user) = user {
        entry.insert("user".into(), user.into());
    }
    if let Some(assistant) = assistant {
        entry.insert("assistant".into(), assistant.into());
    }
    entry.insert("summary".into(), summary.into());
    Value::Object(entry)
}

fn shorten(text: &str) -> String {
    if text.chars().count() <= SUMMARY_MAX_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SUMMARY_MAX_CHARS - 4).collect();
    out.push_str(" ...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::tools::ToolArguments;

    #[tokio::test]
    async fn retrieves_memories_of_the_calling_user_only() {
        let store = Arc::new(InMemoryStore::new());
        store
            .put(
                &Namespace::conversation("alice", "t1"),
                "exchange_1",
                json!({"user": "Weather in Paris?", "assistant": "Sunny.", "timestamp": 1}),
            )
            .await
            .unwrap();
        store
            .put(
                &Namespace::conversation("bob", "t2"),
                "exchange_2",
                json!({"user": "Paris trip", "assistant": "Noted.", "timestamp": 2}),
            )
            .await
            .unwrap();

        let tool = memory_retriever_tool(store);
        let ctx = ToolContext {
            thread_id: "t3".into(),
            user_id: Some("alice".into()),
        };
        let output = tool
            .execute(&ToolArguments::new(json!({"query": "paris"})), &ctx)
            .await
            .unwrap();

        let results = output["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["user"], "Weather in Paris?");
        assert_eq!(results[0]["summary"], "Weather in Paris?\nSunny.");
    }

    #[tokio::test]
    async fn missing_user_is_a_tool_error() {
        let tool = memory_retriever_tool(Arc::new(InMemoryStore::new()));
        let err = tool
            .execute(&ToolArguments::new(json!({"query": "x"})), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::ToolExecution { .. }));
    }

    #[test]
    fn long_summaries_are_shortened() {
        let summary = shorten(&"a".repeat(1000));
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
        assert!(summary.ends_with(" ..."));
    }
}
