//! System prompt assembly (step 2 of the per-turn state machine, §4.10):
//! schema snapshot + selected-patient binding + optional onboarding context.
//! Assembled once per session and prepended to the message log — never
//! rebuilt on later turns, so this module has no dependency on `Session`
//! beyond the values the caller already pulled out of it.

use labtrace_core::types::PatientId;
use labtrace_schema::SchemaSnapshot;
use labtrace_sessions::OnboardingContext;

const BASE_INSTRUCTIONS: &str = "\
You are the clinical lab-data assistant for this account. Answer questions \
about the owner's patients and their lab results using the tools provided. \
Always use execute_sql or fuzzy_search to ground answers in the actual data; \
never invent values. When a numeric trend or distribution would help, call \
show_plot; when a tabular breakdown would help, call show_table. Keep prose \
answers concise — the tools carry the detail.";

pub fn build_system_prompt(
    schema: &SchemaSnapshot,
    selected_patient_id: Option<PatientId>,
    onboarding: Option<&OnboardingContext>,
) -> String {
    let mut prompt = String::from(BASE_INSTRUCTIONS);

    prompt.push_str("\n\n## Queryable schema\n");
    for table in &schema.tables {
        let aliases = table.semantic_aliases.join(", ");
        prompt.push_str(&format!("- `{}` (aka {})\n", table.physical_name, aliases));
        for col in &table.columns {
            prompt.push_str(&format!(
                "  - {} {}{}\n",
                col.column_name,
                col.data_type,
                if col.is_nullable { " (nullable)" } else { "" }
            ));
        }
    }

    match selected_patient_id {
        Some(id) => {
            prompt.push_str(&format!(
                "\n## Selected patient\nThe conversation is scoped to patient_id = {id}. \
                 Every query you run must filter on this patient unless the owner has only one \
                 patient on record.\n"
            ));
        }
        None => {
            prompt.push_str(
                "\n## Selected patient\nNo patient is selected. Ask which patient the owner \
                 means before running patient-scoped queries, unless the owner has exactly one \
                 patient on record.\n",
            );
        }
    }

    if let Some(ctx) = onboarding {
        prompt.push_str("\n## Onboarding summary\nThis patient's most recent reports were just ingested. ");
        prompt.push_str("Use this summary as context for the opening turn; it will not reappear.\n\n");
        prompt.push_str(&ctx.insight_markdown);
        prompt.push_str("\n\n");
        prompt.push_str(&ctx.preview_table_markdown);
        prompt.push('\n');
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_schema::{ColumnInfo, TableManifest};

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot {
            tables: vec![TableManifest {
                physical_name: "patients".to_string(),
                semantic_aliases: vec!["patient".to_string()],
                columns: vec![ColumnInfo {
                    column_name: "id".to_string(),
                    data_type: "uuid".to_string(),
                    is_nullable: false,
                }],
            }],
            snapshot_id: "abc".to_string(),
        }
    }

    #[test]
    fn includes_schema_table_names() {
        let prompt = build_system_prompt(&snapshot(), None, None);
        assert!(prompt.contains("patients"));
        assert!(prompt.contains("No patient is selected"));
    }

    #[test]
    fn mentions_selected_patient_id() {
        let pid = PatientId::new();
        let prompt = build_system_prompt(&snapshot(), Some(pid), None);
        assert!(prompt.contains(&pid.to_string()));
    }

    #[test]
    fn appends_onboarding_context_once() {
        let onboarding = OnboardingContext {
            insight_markdown: "finding: ...".to_string(),
            preview_table_markdown: "| a | b |".to_string(),
        };
        let prompt = build_system_prompt(&snapshot(), None, Some(&onboarding));
        assert!(prompt.contains("finding: ..."));
        assert!(prompt.contains("| a | b |"));
    }
}
