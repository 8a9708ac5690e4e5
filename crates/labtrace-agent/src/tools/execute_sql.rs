//! `execute_sql(sql)` — validated, read-only, row-level-scoped query
//! execution. Result rows are both returned to the LLM and cached on the
//! session as the "last read-only result" (§4.9) for `show_plot`/
//! `show_table` to fall back to.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{Column, Row, TypeInfo};

use crate::sql_validator;
use crate::tool::{Tool, ToolContext, ToolResult};

/// Separate from the plot/table display caps — `execute_sql` itself has no
/// display concern, so it uses the larger of the two (§4.9 "separate caps
/// for plot vs. table queries, e.g., 10000 and 50").
const EXPLORATORY_LIMIT_CAP: u64 = 10_000;

pub struct ExecuteSqlTool;

#[derive(Debug, Deserialize)]
struct Input {
    sql: String,
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn name(&self) -> &str {
        "execute_sql"
    }

    fn description(&self) -> &str {
        "Run a read-only, bounded SQL query against the lab-results store"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {"type": "string", "description": "a single read-only SELECT or WITH statement"}
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext<'_>) -> ToolResult {
        let parsed: Input = match serde_json::from_value(input) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let required_patient = if ctx.owner_patient_count > 1 {
            ctx.session.selected_patient_id()
        } else {
            None
        };

        let validated = match sql_validator::validate(&parsed.sql, ctx.schema, EXPLORATORY_LIMIT_CAP, required_patient) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        match run_scoped_query(ctx, &validated.sql).await {
            Ok(rows) => {
                ctx.session.set_last_sql_result(rows.clone());
                match serde_json::to_string(&rows) {
                    Ok(s) => ToolResult::success(s),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            Err(e) => ToolResult::error(format!("query failed: {e}")),
        }
    }
}

async fn run_scoped_query(ctx: &ToolContext<'_>, sql: &str) -> sqlx::Result<serde_json::Value> {
    let mut tx = ctx.pool.begin().await?;
    sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
        .bind(ctx.user_id.to_string())
        .execute(&mut *tx)
        .await?;

    let rows = sqlx::query(sql).fetch_all(&mut *tx).await?;
    tx.commit().await?;

    let values: Vec<serde_json::Value> = rows.iter().map(row_to_json).collect();
    Ok(serde_json::Value::Array(values))
}

/// Best-effort generic row-to-JSON conversion — the schema snapshot's
/// column types tell us what's plausible, but we decode defensively since
/// the validated query can project arbitrary columns.
fn row_to_json(row: &sqlx::postgres::PgRow) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let value = decode_cell(row, i, col.type_info().name());
        obj.insert(col.name().to_string(), value);
    }
    serde_json::Value::Object(obj)
}

fn decode_cell(row: &sqlx::postgres::PgRow, i: usize, type_name: &str) -> serde_json::Value {
    match type_name {
        "INT2" | "INT4" => row
            .try_get::<i32, _>(i)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "INT8" => row
            .try_get::<i64, _>(i)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => row
            .try_get::<f64, _>(i)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        "BOOL" => row
            .try_get::<bool, _>(i)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(i)
            .map(|u| serde_json::Value::String(u.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMPTZ" | "TIMESTAMP" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
            .map(|t| serde_json::Value::String(t.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(i)
            .unwrap_or(serde_json::Value::Null),
        _ => row
            .try_get::<String, _>(i)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}
