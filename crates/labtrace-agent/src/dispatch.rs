//! Find-and-execute a named tool call. `labtrace-chat` drives the SSE
//! per-iteration loop itself (it owns `tool_start`/`tool_complete` event
//! timing); this module is the piece grounded on the reference
//! architecture's `tool_loop::execute_tool` helper.

use crate::tool::{Tool, ToolContext, ToolResult};

pub async fn dispatch(tools: &[Box<dyn Tool>], name: &str, input: serde_json::Value, ctx: &ToolContext<'_>) -> ToolResult {
    match tools.iter().find(|t| t.name() == name) {
        Some(tool) => tool.execute(input, ctx).await,
        None => ToolResult::error(format!("unknown tool: {name}")),
    }
}

/// Whether a tool name is one of the two display tools, which emit their
/// own SSE event as a side effect of `execute` rather than returning
/// display data for the caller to forward.
pub fn is_display_tool(name: &str) -> bool {
    matches!(name, "show_plot" | "show_table")
}
