//! Converts a pruned [`ChatMessage`] log into the raw Anthropic message
//! array shape `labtrace_llm::ChatRequest::raw_messages` expects, grouping
//! consecutive `Tool`-role entries into one `user` turn carrying multiple
//! `tool_result` blocks — the same grouping the reference architecture's
//! `tool_loop::run_tool_loop` builds inline per iteration, pulled out here
//! since our message log is persisted on the session rather than rebuilt
//! from scratch each call.

use labtrace_sessions::{ChatMessage, ChatRole};

/// Everything but the leading system message (handled separately as
/// `ChatRequest::system`).
pub fn to_raw_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < messages.len() {
        let m = &messages[i];
        match m.role {
            ChatRole::System => i += 1,
            ChatRole::User => {
                out.push(serde_json::json!({ "role": "user", "content": m.content }));
                i += 1;
            }
            ChatRole::Assistant => {
                let mut content: Vec<serde_json::Value> = Vec::new();
                if !m.content.is_empty() {
                    content.push(serde_json::json!({ "type": "text", "text": m.content }));
                }
                for call in &m.tool_calls {
                    content.push(serde_json::json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                out.push(serde_json::json!({ "role": "assistant", "content": content }));
                i += 1;
            }
            ChatRole::Tool => {
                let mut content: Vec<serde_json::Value> = Vec::new();
                while i < messages.len() && messages[i].role == ChatRole::Tool {
                    let t = &messages[i];
                    content.push(serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": t.tool_call_id.clone().unwrap_or_default(),
                        "content": t.content,
                    }));
                    i += 1;
                }
                out.push(serde_json::json!({ "role": "user", "content": content }));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_sessions::ToolCallRequest;

    #[test]
    fn drops_leading_system_message() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let raw = to_raw_messages(&messages);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0]["role"], "user");
    }

    #[test]
    fn groups_consecutive_tool_results_into_one_user_turn() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("q"),
            ChatMessage {
                role: ChatRole::Assistant,
                content: String::new(),
                tool_calls: vec![
                    ToolCallRequest { id: "a".into(), name: "fuzzy_search".into(), arguments: serde_json::json!({}) },
                    ToolCallRequest { id: "b".into(), name: "execute_sql".into(), arguments: serde_json::json!({}) },
                ],
                tool_call_id: None,
            },
            ChatMessage { role: ChatRole::Tool, content: "{}".into(), tool_calls: vec![], tool_call_id: Some("a".into()) },
            ChatMessage { role: ChatRole::Tool, content: "{}".into(), tool_calls: vec![], tool_call_id: Some("b".into()) },
        ];
        let raw = to_raw_messages(&messages);
        assert_eq!(raw.len(), 3); // user q, assistant tool_use x2, user tool_result x2
        let tool_result_turn = &raw[2];
        assert_eq!(tool_result_turn["role"], "user");
        assert_eq!(tool_result_turn["content"].as_array().unwrap().len(), 2);
    }
}
