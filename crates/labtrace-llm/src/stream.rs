/// Events emitted while consuming a provider's streaming response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    Done {
        model: String,
        tokens_in: u32,
        tokens_out: u32,
        stop_reason: String,
    },
    Error {
        message: String,
    },
}

/// Parse a single SSE line. Format: `event: <type>` or `data: <json>`.
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ").map(|data| SseParsed::Data(data.to_string()))
    }
}

#[derive(Debug)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_and_data_lines() {
        assert!(matches!(parse_sse_line("event: message_start"), Some(SseParsed::Event(_))));
        assert!(matches!(parse_sse_line("data: {}"), Some(SseParsed::Data(_))));
        assert!(parse_sse_line(": comment").is_none());
    }
}
