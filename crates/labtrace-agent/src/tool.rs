//! The `Tool` trait all agent tools implement, mirroring the reference
//! architecture's `tools/mod.rs` shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use labtrace_core::types::{SessionId, UserId};
use labtrace_schema::SchemaSnapshot;
use labtrace_sessions::Session;
use labtrace_stream::SseRegistry;

use labtrace_llm::ToolDefinition;

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Everything a tool needs beyond its JSON input: the store connection, the
/// calling user, the current schema snapshot, and the session (for the
/// selected-patient binding and the cached last `execute_sql` result).
pub struct ToolContext<'a> {
    pub pool: &'a PgPool,
    pub user_id: UserId,
    pub schema: &'a SchemaSnapshot,
    pub session: &'a Session,
    /// Total number of patients the owning user has — scope enforcement
    /// only applies once this is greater than one (§4.9).
    pub owner_patient_count: usize,
    /// Display tools (`show_plot`, `show_table`) emit their typed event
    /// directly through this registry rather than returning it to the
    /// caller for re-emission.
    pub sse: &'a SseRegistry,
    pub session_id: SessionId,
    pub message_id: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext<'_>) -> ToolResult;
}

pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}
