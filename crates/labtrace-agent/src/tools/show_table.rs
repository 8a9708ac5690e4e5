use async_trait::async_trait;
use serde::Deserialize;

use labtrace_protocol::ChatEvent;

use crate::tool::{Tool, ToolContext, ToolResult};

pub struct ShowTableTool;

#[derive(Debug, Deserialize)]
struct Input {
    #[serde(default)]
    data: Option<serde_json::Value>,
    table_title: String,
    #[serde(default)]
    replace_previous: bool,
}

#[async_trait]
impl Tool for ShowTableTool {
    fn name(&self) -> &str {
        "show_table"
    }

    fn description(&self) -> &str {
        "Display rows as a table to the user. Falls back to the last execute_sql result if data is omitted."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "data": {"description": "rows to display; omit to reuse the last execute_sql result"},
                "table_title": {"type": "string"},
                "replace_previous": {"type": "boolean", "default": false}
            },
            "required": ["table_title"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext<'_>) -> ToolResult {
        let parsed: Input = match serde_json::from_value(input) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let rows = match parsed.data.or_else(|| ctx.session.last_sql_result()) {
            Some(rows) => rows,
            None => return ToolResult::error("no data given and no cached execute_sql result to fall back to".to_string()),
        };

        ctx.sse
            .emit(
                ctx.session_id,
                ChatEvent::TableResult {
                    message_id: ctx.message_id.clone(),
                    table_title: parsed.table_title.clone(),
                    rows,
                    replace_previous: parsed.replace_previous,
                },
            )
            .await;

        ToolResult::success(format!("displayed table \"{}\"", parsed.table_title))
    }
}
