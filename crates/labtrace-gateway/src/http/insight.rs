//! POST /patients/{patient_id}/insight — generate the onboarding insight
//! (§4.11) over a caller-supplied set of report ids. The response is the
//! exact `OnboardingContext` shape **create session** accepts; the gateway
//! does not persist it, the caller is expected to hand it straight through.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use labtrace_core::error::ErrorKind;
use labtrace_core::types::{PatientId, ReportId};
use labtrace_insight::Insight;
use labtrace_sessions::OnboardingContext;

use crate::auth::{authenticate, AuthContext};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InsightRequest {
    pub report_ids: Vec<ReportId>,
}

pub async fn generate_insight(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(patient_id): Path<PatientId>,
    Json(req): Json<InsightRequest>,
) -> ApiResult<Json<OnboardingContext>> {
    let AuthContext { user_id, .. } = authenticate(&state.config, &headers)?;

    if !labtrace_chat::patients::patient_exists(state.pool(), user_id, patient_id).await? {
        return Err(ErrorKind::NotFound("patient not found".to_string()).into());
    }

    let rows = labtrace_insight::fetch_parameter_rows(state.pool(), patient_id, &req.report_ids).await?;
    let preview_table_markdown = labtrace_insight::build_preview_table(&rows);
    let insight = labtrace_insight::generate_insight(state.llm.as_ref(), &state.config.providers.insight_model, &rows).await?;

    Ok(Json(OnboardingContext {
        insight_markdown: render_insight_markdown(&insight),
        preview_table_markdown,
    }))
}

fn render_insight_markdown(insight: &Insight) -> String {
    let mut out = format!(
        "**Finding**\n{}\n\n**Action**\n{}\n\n**Tracking**\n{}\n",
        insight.finding, insight.action, insight.tracking
    );
    if !insight.follow_ups.is_empty() {
        out.push_str("\n**You might also ask**\n");
        for q in &insight.follow_ups {
            out.push_str(&format!("- {q}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_follow_ups_section_when_empty() {
        let insight = Insight {
            finding: "LDL trending up".to_string(),
            action: "Recheck lipid panel in 3 months".to_string(),
            tracking: "LDL, HDL".to_string(),
            follow_ups: vec![],
        };
        let md = render_insight_markdown(&insight);
        assert!(!md.contains("You might also ask"));
        assert!(md.contains("LDL trending up"));
    }

    #[test]
    fn includes_each_follow_up_as_bullet() {
        let insight = Insight {
            finding: "f".to_string(),
            action: "a".to_string(),
            tracking: "t".to_string(),
            follow_ups: vec!["why now?".to_string(), "what changed?".to_string()],
        };
        let md = render_insight_markdown(&insight);
        assert!(md.contains("- why now?\n"));
        assert!(md.contains("- what changed?\n"));
    }
}
