use sqlx::PgPool;
use tracing::instrument;

use labtrace_core::config::MappingConfig;
use labtrace_core::types::{LabResultId, MappingSource};
use labtrace_llm::LlmProvider;

use crate::error::Result;
use crate::normalize::normalize_alias;
use crate::persist;
use crate::tiers::{self, LlmOutcome};
use crate::types::{MappingOutcome, MatchCandidate};

const FUZZY_CANDIDATE_LIMIT: i64 = 5;

/// Route one raw parameter through the three tiers (§4.8), stopping at the
/// first that yields an accept-level score, and persist the outcome.
#[instrument(skip(pool, provider, config))]
pub async fn map_result(
    pool: &PgPool,
    provider: &dyn LlmProvider,
    chat_model: &str,
    config: &MappingConfig,
    lab_result_id: LabResultId,
    raw_parameter: &str,
) -> Result<MappingOutcome> {
    if let Some((analyte_id, confidence)) = tiers::lookup_exact(pool, raw_parameter).await? {
        persist::bind_result(pool, lab_result_id, analyte_id, confidence, MappingSource::AliasExact).await?;
        return Ok(MappingOutcome::Bound {
            analyte_id,
            confidence,
            source: MappingSource::AliasExact,
        });
    }

    let candidates = tiers::lookup_fuzzy(pool, raw_parameter, FUZZY_CANDIDATE_LIMIT).await?;
    if let Some(top) = candidates.first() {
        if top.score >= config.auto_accept {
            let analyte_id = top.analyte_id.expect("fuzzy candidate always carries an analyte_id");
            persist::bind_result(pool, lab_result_id, analyte_id, top.score, MappingSource::FuzzyAuto).await?;
            return Ok(MappingOutcome::Bound {
                analyte_id,
                confidence: top.score,
                source: MappingSource::FuzzyAuto,
            });
        }
        if top.score >= config.queue_lower {
            let review_candidates: Vec<MatchCandidate> = candidates
                .into_iter()
                .filter(|c| c.score >= config.queue_lower)
                .collect();
            let count = review_candidates.len();
            persist::create_match_review(pool, lab_result_id, &review_candidates).await?;
            return Ok(MappingOutcome::QueuedForReview { candidate_count: count });
        }
    }

    let nearby_codes: Vec<String> = candidates.iter().map(|c| c.label.clone()).collect();
    let outcome = tiers::propose_llm(provider, chat_model, raw_parameter, &nearby_codes).await?;

    match outcome {
        LlmOutcome::ExistingAnalyte { code, confidence } => {
            match persist::find_analyte_by_code(pool, &code).await? {
                Some(analyte_id) if confidence >= config.auto_accept => {
                    persist::bind_result(pool, lab_result_id, analyte_id, confidence, MappingSource::LlmAuto).await?;
                    Ok(MappingOutcome::Bound {
                        analyte_id,
                        confidence,
                        source: MappingSource::LlmAuto,
                    })
                }
                Some(analyte_id) if confidence >= config.queue_lower => {
                    let review_candidates = vec![MatchCandidate {
                        analyte_id: Some(analyte_id),
                        proposed_code: None,
                        label: code,
                        score: confidence,
                    }];
                    persist::create_match_review(pool, lab_result_id, &review_candidates).await?;
                    Ok(MappingOutcome::QueuedForReview { candidate_count: 1 })
                }
                _ => Ok(MappingOutcome::Unmapped),
            }
        }
        LlmOutcome::NewProposal { code, name, .. } => {
            persist::create_pending_analyte(pool, &code, &name, lab_result_id, raw_parameter, None).await?;
            Ok(MappingOutcome::QueuedProposal { proposed_code: code })
        }
    }
}

/// Test-only helper exposed for the threshold-gating unit tests: the same
/// decision logic as `map_result`'s fuzzy branch, without the DB round trip.
pub fn classify_score(score: f64, config: &MappingConfig) -> &'static str {
    if score >= config.auto_accept {
        "auto_accept"
    } else if score >= config.queue_lower {
        "queue"
    } else {
        "below_queue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MappingConfig {
        MappingConfig {
            auto_accept: 0.90,
            queue_lower: 0.65,
            backfill_threshold: 0.80,
        }
    }

    #[test]
    fn classifies_above_auto_accept() {
        assert_eq!(classify_score(0.95, &cfg()), "auto_accept");
    }

    #[test]
    fn classifies_in_queue_band() {
        assert_eq!(classify_score(0.78, &cfg()), "queue");
        assert_eq!(classify_score(0.74, &cfg()), "queue");
    }

    #[test]
    fn classifies_below_queue() {
        assert_eq!(classify_score(0.3, &cfg()), "below_queue");
    }

    #[test]
    fn normalize_is_used_consistently_with_exact_tier() {
        assert_eq!(normalize_alias("  HGB  "), "hgb");
    }
}
