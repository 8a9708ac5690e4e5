//! The three mapping tiers (§4.8), each queried independently by
//! [`crate::engine::map_result`] in order until one yields an accept-level
//! score.

use serde::Deserialize;
use sqlx::PgPool;

use labtrace_core::types::AnalyteId;
use labtrace_llm::LlmProvider;

use crate::error::{MappingError, Result};
use crate::normalize::normalize_alias;
use crate::types::MatchCandidate;

/// Tier 1: exact lookup of a normalized alias key. `confidence` is the
/// alias row's own confidence, not a computed similarity — an exact alias
/// hit is either present or absent.
pub async fn lookup_exact(pool: &PgPool, raw_parameter: &str) -> Result<Option<(AnalyteId, f64)>> {
    let key = normalize_alias(raw_parameter);

    let row: Option<(uuid::Uuid, f64)> = sqlx::query_as(
        "SELECT analyte_id, confidence FROM analyte_aliases WHERE normalized_alias = $1
         ORDER BY confidence DESC LIMIT 1",
    )
    .bind(&key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, confidence)| (AnalyteId::from(id), confidence)))
}

/// Tier 2: fuzzy trigram similarity, delegated entirely to Postgres'
/// `pg_trgm` extension rather than reimplemented in Rust (§4.8).
pub async fn lookup_fuzzy(pool: &PgPool, raw_parameter: &str, limit: i64) -> Result<Vec<MatchCandidate>> {
    let rows: Vec<(uuid::Uuid, String, f64)> = sqlx::query_as(
        "SELECT a.analyte_id, a.display_form, similarity(a.normalized_alias, $1) AS score
         FROM analyte_aliases a
         WHERE a.normalized_alias % $1
         ORDER BY score DESC
         LIMIT $2",
    )
    .bind(normalize_alias(raw_parameter))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, display_form, score)| MatchCandidate {
            analyte_id: Some(AnalyteId::from(id)),
            proposed_code: None,
            label: display_form,
            score,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct LlmProposal {
    /// Present when the model recognizes the parameter as an existing
    /// analyte code rather than something new.
    #[serde(default)]
    existing_analyte_code: Option<String>,
    #[serde(default)]
    proposed_code: Option<String>,
    #[serde(default)]
    proposed_name: Option<String>,
    confidence: f64,
}

pub enum LlmOutcome {
    ExistingAnalyte { code: String, confidence: f64 },
    NewProposal { code: String, name: String, confidence: f64 },
}

const LLM_SYSTEM_PROMPT: &str = "You map a raw lab parameter name onto a canonical analyte \
vocabulary. Respond with a single JSON object: either {\"existing_analyte_code\": <code>, \
\"confidence\": <0..1>} if the parameter matches one of the candidate codes given, or \
{\"proposed_code\": <short_snake_case_code>, \"proposed_name\": <human name>, \"confidence\": \
<0..1>} if it does not match any of them. Never invent an existing_analyte_code that was not \
given to you.";

/// Tier 3: ask the LLM to either pick one of the nearest-known codes or
/// propose a brand new canonical analyte.
pub async fn propose_llm(
    provider: &dyn LlmProvider,
    model: &str,
    raw_parameter: &str,
    nearby_codes: &[String],
) -> Result<LlmOutcome> {
    let prompt = format!(
        "Raw parameter: {raw_parameter:?}\nCandidate existing codes: {nearby_codes:?}\n\
         Choose the best match or propose a new analyte."
    );

    let value = labtrace_llm::complete_json(provider, model, LLM_SYSTEM_PROMPT, &prompt, 512)
        .await
        .map_err(MappingError::Provider)?;

    let proposal: LlmProposal = serde_json::from_value(value)
        .map_err(|e| MappingError::MalformedProposal(e.to_string()))?;

    if let Some(code) = proposal.existing_analyte_code {
        return Ok(LlmOutcome::ExistingAnalyte {
            code,
            confidence: proposal.confidence,
        });
    }

    let code = proposal
        .proposed_code
        .ok_or_else(|| MappingError::MalformedProposal("neither existing_analyte_code nor proposed_code set".into()))?;
    let name = proposal
        .proposed_name
        .ok_or_else(|| MappingError::MalformedProposal("proposed_code given without proposed_name".into()))?;

    Ok(LlmOutcome::NewProposal {
        code,
        name,
        confidence: proposal.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_existing_analyte_proposal() {
        let raw = serde_json::json!({"existing_analyte_code": "hgb_a1c", "confidence": 0.82});
        let proposal: LlmProposal = serde_json::from_value(raw).unwrap();
        assert_eq!(proposal.existing_analyte_code.as_deref(), Some("hgb_a1c"));
    }

    #[test]
    fn parses_new_proposal() {
        let raw = serde_json::json!({"proposed_code": "vitamin_k2", "proposed_name": "Vitamin K2", "confidence": 0.4});
        let proposal: LlmProposal = serde_json::from_value(raw).unwrap();
        assert_eq!(proposal.proposed_code.as_deref(), Some("vitamin_k2"));
        assert_eq!(proposal.proposed_name.as_deref(), Some("Vitamin K2"));
    }
}
