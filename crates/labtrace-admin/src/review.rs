use serde_json::json;
use sqlx::PgPool;
use tracing::instrument;

use labtrace_core::types::{AnalyteId, MatchReviewId, PendingAnalyteId};
use labtrace_mapping::{MatchReview, PendingAnalyte};

use crate::audit;
use crate::error::Result;
use crate::permission::require_allowed;
use crate::types::{AdminAction, AdminCaller};

pub async fn list_pending_analytes(pool: &PgPool, caller: &AdminCaller) -> Result<Vec<PendingAnalyte>> {
    require_allowed(caller, AdminAction::ListPendingAnalytes)?;
    Ok(labtrace_mapping::list_pending_analytes(pool).await?)
}

pub async fn list_pending_reviews(pool: &PgPool, caller: &AdminCaller) -> Result<Vec<MatchReview>> {
    require_allowed(caller, AdminAction::ListPendingReviews)?;
    Ok(labtrace_mapping::list_pending_reviews(pool).await?)
}

/// Approve a pending analyte proposal, running the two-phase backfill
/// (labtrace-mapping::approve_pending_analyte), then append the audit row.
#[instrument(skip(pool))]
pub async fn approve_pending_analyte(
    pool: &PgPool,
    caller: &AdminCaller,
    pending_analyte_id: PendingAnalyteId,
    backfill_threshold: f64,
) -> Result<AnalyteId> {
    require_allowed(caller, AdminAction::ApprovePendingAnalyte)?;
    let analyte_id = labtrace_mapping::approve_pending_analyte(pool, pending_analyte_id, backfill_threshold).await?;
    audit::record(
        pool,
        caller.id,
        AdminAction::ApprovePendingAnalyte,
        json!({ "pending_analyte_id": pending_analyte_id.to_string(), "analyte_id": analyte_id.to_string() }),
    )
    .await?;
    Ok(analyte_id)
}

#[instrument(skip(pool))]
pub async fn discard_pending_analyte(pool: &PgPool, caller: &AdminCaller, pending_analyte_id: PendingAnalyteId) -> Result<()> {
    require_allowed(caller, AdminAction::DiscardPendingAnalyte)?;
    labtrace_mapping::discard_pending_analyte(pool, pending_analyte_id).await?;
    audit::record(
        pool,
        caller.id,
        AdminAction::DiscardPendingAnalyte,
        json!({ "pending_analyte_id": pending_analyte_id.to_string() }),
    )
    .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn resolve_match_review(
    pool: &PgPool,
    caller: &AdminCaller,
    review_id: MatchReviewId,
    chosen_analyte_id: AnalyteId,
) -> Result<()> {
    require_allowed(caller, AdminAction::ResolveMatchReview)?;
    labtrace_mapping::resolve_match_review(pool, review_id, chosen_analyte_id).await?;
    audit::record(
        pool,
        caller.id,
        AdminAction::ResolveMatchReview,
        json!({ "review_id": review_id.to_string(), "chosen_analyte_id": chosen_analyte_id.to_string() }),
    )
    .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn skip_match_review(pool: &PgPool, caller: &AdminCaller, review_id: MatchReviewId) -> Result<()> {
    require_allowed(caller, AdminAction::SkipMatchReview)?;
    labtrace_mapping::skip_match_review(pool, review_id).await?;
    audit::record(pool, caller.id, AdminAction::SkipMatchReview, json!({ "review_id": review_id.to_string() })).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_core::types::{UserId, UserRole};

    #[test]
    fn require_allowed_rejects_non_admin() {
        let caller = AdminCaller { id: UserId::new(), role: UserRole::User };
        let err = require_allowed(&caller, AdminAction::ResetStore).unwrap_err();
        assert_eq!(err.code(), "SCOPE_VIOLATION");
    }
}
