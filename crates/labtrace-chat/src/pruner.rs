//! Token-budget pruning for the message log handed to the LLM each turn
//! (spec §4.10, final paragraph). Pure function, no I/O, so it is tested
//! in isolation from the turn state machine.

use labtrace_core::config::CHARS_PER_TOKEN_ESTIMATE;
use labtrace_sessions::{ChatMessage, ChatRole};

/// Estimate token count for one message: role overhead plus content length,
/// at `CHARS_PER_TOKEN_ESTIMATE` chars/token.
fn estimate_tokens(message: &ChatMessage) -> usize {
    let tool_json_len: usize = message
        .tool_calls
        .iter()
        .map(|c| c.arguments.to_string().len())
        .sum();
    (message.content.len() + tool_json_len) / CHARS_PER_TOKEN_ESTIMATE + 4
}

fn total_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(estimate_tokens).sum()
}

/// Prune `messages` to fit `token_budget`, retaining the system prompt (the
/// first message, always `ChatRole::System`) plus the most recent messages
/// that fit. Expands the retention window backward if the first retained
/// non-system message is a tool response (so the assistant `tool_calls`
/// message it answers is kept too), then drops a trailing assistant
/// `tool_calls` message whose tool responses got pruned — preserving the
/// invariant that every assistant tool-calls message is followed by its
/// matching tool responses.
pub fn prune(messages: &[ChatMessage], token_budget: usize, min_retained: usize) -> Vec<ChatMessage> {
    if total_tokens(messages) <= token_budget {
        return messages.to_vec();
    }

    let Some((system, rest)) = messages.split_first() else {
        return messages.to_vec();
    };

    let mut start = rest.len().saturating_sub(min_retained);

    // Expand backward while the window's budget is exceeded, and while the
    // first retained message is a tool response (its assistant tool_calls
    // message must accompany it).
    loop {
        let window_tokens = estimate_tokens(system) + total_tokens(&rest[start..]);
        let starts_on_tool_response = rest.get(start).map(|m| m.role == ChatRole::Tool).unwrap_or(false);

        if starts_on_tool_response && start > 0 {
            start -= 1;
            continue;
        }

        if window_tokens > token_budget && start > 0 {
            start -= 1;
            continue;
        }

        break;
    }

    let mut retained: Vec<ChatMessage> = rest[start..].to_vec();

    // If the window now ends on an assistant message with pending tool
    // calls (its responses fell before `start` and got pruned), drop it —
    // a dangling tool_calls message with no responses would be rejected by
    // the provider.
    if retained.last().map(|m| m.has_pending_tool_calls()).unwrap_or(false) {
        retained.pop();
    }

    let mut out = Vec::with_capacity(retained.len() + 1);
    out.push(system.clone());
    out.extend(retained);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_call(id: &str) -> labtrace_sessions::ToolCallRequest {
        labtrace_sessions::ToolCallRequest {
            id: id.to_string(),
            name: "execute_sql".to_string(),
            arguments: serde_json::json!({"sql": "select 1"}),
        }
    }

    fn assistant_with_tool_call(id: &str) -> ChatMessage {
        ChatMessage {
            role: ChatRole::Assistant,
            content: String::new(),
            tool_calls: vec![tool_call(id)],
            tool_call_id: None,
        }
    }

    fn tool_response(id: &str) -> ChatMessage {
        ChatMessage {
            role: ChatRole::Tool,
            content: "{}".to_string(),
            tool_calls: Vec::new(),
            tool_call_id: Some(id.to_string()),
        }
    }

    #[test]
    fn under_budget_is_unchanged() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let pruned = prune(&messages, 10_000, 20);
        assert_eq!(pruned.len(), 2);
    }

    #[test]
    fn over_budget_retains_system_and_tail() {
        let mut messages = vec![ChatMessage::system("sys")];
        for i in 0..200 {
            messages.push(ChatMessage::user(format!("{i}: {}", "x".repeat(50))));
        }
        let pruned = prune(&messages, 200, 5);
        assert!(matches!(pruned[0].role, ChatRole::System));
        assert!(pruned.len() < messages.len());
    }

    #[test]
    fn expands_window_to_keep_tool_calls_with_its_response() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("irrelevant padding ".repeat(40)),
            assistant_with_tool_call("call-1"),
            tool_response("call-1"),
            ChatMessage::user("latest question"),
        ];
        // budget small enough to force pruning, min_retained=2 would start
        // the window on the tool response alone without expansion.
        let pruned = prune(&messages, 40, 2);
        let has_call = pruned.iter().any(|m| m.tool_calls.iter().any(|c| c.id == "call-1"));
        let has_response = pruned
            .iter()
            .any(|m| m.tool_call_id.as_deref() == Some("call-1"));
        assert_eq!(has_call, has_response, "tool call and its response must both be present or both absent");
    }

    #[test]
    fn drops_trailing_dangling_tool_call() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("old".repeat(100)),
            assistant_with_tool_call("orphan"),
        ];
        let pruned = prune(&messages, 5, 1);
        assert!(!pruned.iter().any(|m| m.has_pending_tool_calls()));
    }
}
