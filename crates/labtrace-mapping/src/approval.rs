use sqlx::PgPool;
use tracing::instrument;

use labtrace_core::types::{AnalyteId, MappingSource, MatchReviewId, PendingAnalyteId};

use crate::error::{MappingError, Result};
use crate::normalize::normalize_alias;
use crate::persist;
use crate::types::MatchReviewStatus;

/// Approve a `PendingAnalyte`: mint the canonical `Analyte`, register its
/// evidence variations as aliases, then run the two-phase backfill (§4.8,
/// §8 scenario 4) — (i) bind still-unmapped results whose parameter
/// fuzzy-matches a variation above `backfill_threshold`, (ii) resolve every
/// `MatchReview` that references the approved proposed code. All in one
/// transaction.
#[instrument(skip(pool))]
pub async fn approve_pending_analyte(
    pool: &PgPool,
    pending_analyte_id: PendingAnalyteId,
    backfill_threshold: f64,
) -> Result<AnalyteId> {
    let mut tx = pool.begin().await?;

    let pending = persist::fetch_pending_analyte_tx(&mut tx, pending_analyte_id)
        .await?
        .ok_or(MappingError::PendingAnalyteNotFound(pending_analyte_id))?;

    let analyte_id = persist::create_analyte_tx(&mut tx, &pending.proposed_code, &pending.proposed_name).await?;

    let variations = persist::evidence_variations_tx(&mut tx, pending_analyte_id).await?;
    for variation in &variations {
        persist::insert_alias_tx(
            &mut tx,
            analyte_id,
            &normalize_alias(variation),
            variation,
            1.0,
            MappingSource::ManualApproved,
        )
        .await?;
    }

    persist::set_pending_analyte_status_tx(&mut tx, pending_analyte_id, "approved").await?;

    // Phase (i): backfill still-unmapped results matching any evidence variation.
    for variation in &variations {
        let matches = persist::find_unmapped_fuzzy_matches_tx(&mut tx, variation, backfill_threshold).await?;
        for lab_result_id in matches {
            persist::bind_result_tx(&mut tx, lab_result_id, analyte_id, 1.0, MappingSource::ManualApproved).await?;
        }
    }

    // Phase (ii): resolve every MatchReview referencing the approved code,
    // even if its result was already bound in phase (i) above.
    let reviews = persist::find_pending_reviews_for_proposed_code(pool, &pending.proposed_code).await?;
    for review_id in reviews {
        resolve_review_tx(&mut tx, review_id, analyte_id).await?;
    }

    tx.commit().await?;
    Ok(analyte_id)
}

/// Discard a pending analyte without creating an `Analyte` or touching any
/// `LabResult`.
pub async fn discard_pending_analyte(pool: &PgPool, pending_analyte_id: PendingAnalyteId) -> Result<()> {
    let mut tx = pool.begin().await?;
    persist::fetch_pending_analyte_tx(&mut tx, pending_analyte_id)
        .await?
        .ok_or(MappingError::PendingAnalyteNotFound(pending_analyte_id))?;
    persist::set_pending_analyte_status_tx(&mut tx, pending_analyte_id, "discarded").await?;
    tx.commit().await?;
    Ok(())
}

/// Resolve a `MatchReview` by the admin's chosen candidate — binds the
/// underlying result with source `manual_resolved`.
#[instrument(skip(pool))]
pub async fn resolve_match_review(pool: &PgPool, review_id: MatchReviewId, chosen_analyte_id: AnalyteId) -> Result<()> {
    let review = persist::fetch_match_review(pool, review_id)
        .await?
        .ok_or(MappingError::MatchReviewNotFound(review_id))?;

    if review.status != MatchReviewStatus::Pending {
        return Err(MappingError::MatchReviewNotPending(review_id));
    }

    let mut tx = pool.begin().await?;
    persist::bind_result_tx(&mut tx, review.lab_result_id, chosen_analyte_id, 1.0, MappingSource::ManualResolved).await?;
    persist::set_match_review_status_tx(&mut tx, review_id, MatchReviewStatus::Resolved).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn skip_match_review(pool: &PgPool, review_id: MatchReviewId) -> Result<()> {
    let review = persist::fetch_match_review(pool, review_id)
        .await?
        .ok_or(MappingError::MatchReviewNotFound(review_id))?;
    if review.status != MatchReviewStatus::Pending {
        return Err(MappingError::MatchReviewNotPending(review_id));
    }
    let mut tx = pool.begin().await?;
    persist::set_match_review_status_tx(&mut tx, review_id, MatchReviewStatus::Skipped).await?;
    tx.commit().await?;
    Ok(())
}

async fn resolve_review_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    review_id: MatchReviewId,
    analyte_id: AnalyteId,
) -> Result<()> {
    // The review's lab_result may already be bound by phase (i); binding
    // again with the same analyte is idempotent. The review is always
    // marked resolved regardless (§4.8).
    if let Some(review) = persist::fetch_review_for_update_tx(tx, review_id).await? {
        persist::bind_result_tx(tx, review.lab_result_id, analyte_id, 1.0, MappingSource::ManualApproved).await?;
    }
    persist::set_match_review_status_tx(tx, review_id, MatchReviewStatus::Resolved).await?;
    Ok(())
}
