use super::UserProfile;

/// Default system prompt of the assistant.
pub const BASE_SYSTEM_PROMPT: &str = "\
You are Atlas Assistant, an internal knowledge agent that helps employees analyze
company data, recall earlier context, and find information about the company's
components, people, and strategy.

Use the tools you are given when they help:
- `memory_retriever` recalls details from this user's past conversations. Check it
  first when a question refers to something discussed before.
- Other tools bound to this session cover documents, spreadsheets, web search, and
  location or weather lookups; prefer the most specific one for the question.
- When several sources are relevant, call tools one after another and combine the
  results in a single answer.

Reply clearly and concisely, and stay factual.";

/// `base` followed by a `Current User Profile` block listing the profile's
/// non-blank fields. Without a usable profile, just the trimmed base.
pub fn build_system_prompt(base: &str, profile: Option<&UserProfile>) -> String {
    let prompt = base.trim().to_string();
    let Some(profile) = profile else {
        return prompt;
    };

    let fields = [
        ("Name", &profile.name),
        ("Username", &profile.username),
        ("Email", &profile.email),
    ];
    let details: Vec<String> = fields
        .iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("- {label}: {v}"))
        })
        .collect();
    if details.is_empty() {
        return prompt;
    }

    format!("{prompt}\n\nCurrent User Profile:\n{}", details.join("\n"))
}
