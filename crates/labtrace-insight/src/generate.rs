//! One-shot structured insight generation (§4.11), modeled on the reference
//! architecture's `compact.rs` fact-extraction call: cheap model, strict
//! output contract, tolerant JSON-in-prose extraction via `complete_json`.

use labtrace_llm::LlmProvider;

use crate::error::{InsightError, Result};
use crate::types::{Insight, ParameterRow};

const SYSTEM_PROMPT: &str = "\
You are a clinical lab-result summarizer. Given a set of lab parameter \
rows for one patient, produce a strict JSON object with exactly these \
keys: \"finding\" (what's notable in these results, one short paragraph), \
\"action\" (what the patient should consider doing about it, one short \
paragraph), \"tracking\" (what to keep monitoring going forward, one short \
paragraph), and \"follow_ups\" (a JSON array of 2 to 4 short follow-up \
questions the patient might naturally ask next). Write every field in the \
same language as the parameter names and values you were given. Return \
ONLY the JSON object, no surrounding prose.";

const MAX_TOKENS: u32 = 1024;

pub async fn generate_insight(provider: &dyn LlmProvider, model: &str, rows: &[ParameterRow]) -> Result<Insight> {
    if rows.is_empty() {
        return Err(InsightError::NoData);
    }

    let transcript = rows
        .iter()
        .map(format_row)
        .collect::<Vec<_>>()
        .join("\n");

    let user_prompt = format!("Lab parameter rows:\n{transcript}");

    let value = labtrace_llm::complete_json(provider, model, SYSTEM_PROMPT, &user_prompt, MAX_TOKENS).await?;
    let insight: Insight = serde_json::from_value(value).map_err(|e| InsightError::MalformedInsight(e.to_string()))?;

    if insight.follow_ups.is_empty() || insight.follow_ups.len() > 4 {
        return Err(InsightError::MalformedInsight(format!(
            "expected 2-4 follow_ups, got {}",
            insight.follow_ups.len()
        )));
    }

    Ok(insight)
}

fn format_row(row: &ParameterRow) -> String {
    let value = row
        .value_numeric
        .map(|v| v.to_string())
        .or_else(|| row.value_text.clone())
        .unwrap_or_else(|| "n/a".to_string());
    let unit = row.unit.as_deref().unwrap_or("");
    let date = row.test_date_text.as_deref().unwrap_or("unknown date");
    format!("- [{date}] {}: {value} {unit} ({})", row.parameter_name_raw, row.out_of_range)
}

/// Compact markdown table of the same rows, handed alongside the insight as
/// the onboarding context's preview (§4.11).
pub fn build_preview_table(rows: &[ParameterRow]) -> String {
    let mut out = String::from("| parameter | value | unit | status | date |\n|---|---|---|---|---|\n");
    for row in rows {
        let value = row
            .value_numeric
            .map(|v| v.to_string())
            .or_else(|| row.value_text.clone())
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!(
            "| {} | {value} | {} | {} | {} |\n",
            row.parameter_name_raw,
            row.unit.as_deref().unwrap_or(""),
            row.out_of_range,
            row.test_date_text.as_deref().unwrap_or("")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str) -> ParameterRow {
        ParameterRow {
            parameter_name_raw: name.to_string(),
            value_numeric: Some(5.4),
            value_text: None,
            unit: Some("mmol/L".to_string()),
            out_of_range: "within".to_string(),
            test_date_text: Some("2026-01-02".to_string()),
        }
    }

    #[test]
    fn preview_table_has_header_and_one_row_per_parameter() {
        let table = build_preview_table(&[row("glucose"), row("sodium")]);
        assert!(table.contains("| parameter |"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn format_row_falls_back_to_text_value() {
        let mut r = row("notes");
        r.value_numeric = None;
        r.value_text = Some("trace".to_string());
        assert!(format_row(&r).contains("trace"));
    }
}
