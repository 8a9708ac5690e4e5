//! One-shot structured-output helper shared by the mapping LLM tier and the
//! onboarding insight generator: send a prompt that asks for strict JSON,
//! then recover the JSON value even if the model wrapped it in prose or a
//! fenced code block.

use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError, Role};

pub async fn complete_json(
    provider: &dyn LlmProvider,
    model: &str,
    system: &str,
    user_prompt: &str,
    max_tokens: u32,
) -> Result<serde_json::Value, ProviderError> {
    let req = ChatRequest {
        model: model.to_string(),
        system: system.to_string(),
        messages: vec![Message { role: Role::User, content: user_prompt.to_string() }],
        raw_messages: None,
        max_tokens,
        tools: Vec::new(),
    };

    let response = provider.send(&req).await?;
    extract_json(&response.content).map_err(ProviderError::Parse)
}

/// Extracts a JSON value from model output, tolerating surrounding prose or
/// a fenced code block by taking the outermost matching bracket pair.
fn extract_json(raw: &str) -> Result<serde_json::Value, String> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let candidates = [('{', '}'), ('[', ']')];
    let mut best: Option<&str> = None;
    for (open, close) in candidates {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if end >= start {
                let slice = &trimmed[start..=end];
                if best.map(|b| slice.len() > b.len()).unwrap_or(true) {
                    best = Some(slice);
                }
            }
        }
    }

    match best {
        Some(slice) => serde_json::from_str(slice).map_err(|e| format!("malformed JSON in model output: {e}")),
        None => Err("model output contained no JSON value".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        assert_eq!(extract_json("{\"a\":1}").unwrap(), serde_json::json!({"a": 1}));
    }

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let raw = "Sure, here you go:\n```json\n{\"a\": 1}\n```\nLet me know if you need more.";
        assert_eq!(extract_json(raw).unwrap(), serde_json::json!({"a": 1}));
    }

    #[test]
    fn errors_when_no_json_present() {
        assert!(extract_json("no json here").is_err());
    }
}
