//! `fuzzy_search(term, scope)` — suggests likely parameter names, analytes,
//! or patient tokens. Runs its own direct `pg_trgm` query rather than
//! depending on `labtrace-mapping`'s matcher, which would create a cycle
//! (mapping's LLM tier already depends on `labtrace-llm`, which `agent`
//! also depends on).

use async_trait::async_trait;
use serde::Deserialize;

use crate::tool::{Tool, ToolContext, ToolResult};

pub struct FuzzySearchTool;

#[derive(Debug, Deserialize)]
struct Input {
    term: String,
    #[serde(default)]
    scope: Option<String>,
}

#[async_trait]
impl Tool for FuzzySearchTool {
    fn name(&self) -> &str {
        "fuzzy_search"
    }

    fn description(&self) -> &str {
        "Suggest likely parameter names, analytes, or patient tokens matching a search term"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "term": {"type": "string", "description": "search term"},
                "scope": {"type": "string", "enum": ["analyte", "patient"], "description": "restrict the search to one entity kind"}
            },
            "required": ["term"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext<'_>) -> ToolResult {
        let parsed: Input = match serde_json::from_value(input) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let mut matches: Vec<serde_json::Value> = Vec::new();

        if parsed.scope.as_deref() != Some("patient") {
            match search_analytes(ctx, &parsed.term).await {
                Ok(rows) => matches.extend(rows),
                Err(e) => return ToolResult::error(e.to_string()),
            }
        }

        if parsed.scope.as_deref() != Some("analyte") {
            match search_patients(ctx, &parsed.term).await {
                Ok(rows) => matches.extend(rows),
                Err(e) => return ToolResult::error(e.to_string()),
            }
        }

        match serde_json::to_string(&matches) {
            Ok(s) => ToolResult::success(s),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

async fn search_analytes(ctx: &ToolContext<'_>, term: &str) -> sqlx::Result<Vec<serde_json::Value>> {
    let rows: Vec<(String, String, f64)> = sqlx::query_as(
        "SELECT a.code, aa.display_form, similarity(aa.normalized_alias, $1) AS score
         FROM analyte_aliases aa JOIN analytes a ON a.id = aa.analyte_id
         WHERE aa.normalized_alias % $1
         ORDER BY score DESC LIMIT 10",
    )
    .bind(term.to_lowercase())
    .fetch_all(ctx.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(code, display, score)| serde_json::json!({"kind": "analyte", "code": code, "label": display, "score": score}))
        .collect())
}

async fn search_patients(ctx: &ToolContext<'_>, term: &str) -> sqlx::Result<Vec<serde_json::Value>> {
    let rows: Vec<(uuid::Uuid, String, f64)> = sqlx::query_as(
        "SELECT id, full_name, similarity(lower(full_name), $1) AS score
         FROM patients
         WHERE owner_user_id = $2 AND lower(full_name) % $1
         ORDER BY score DESC LIMIT 10",
    )
    .bind(term.to_lowercase())
    .bind(ctx.user_id.as_uuid())
    .fetch_all(ctx.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, score)| serde_json::json!({"kind": "patient", "patient_id": id, "label": name, "score": score}))
        .collect())
}
