//! Admin endpoints (§4.12), wired straight through to `labtrace_admin`'s
//! gated review/reset functions — every handler just extracts an
//! `AdminCaller` from the authenticated caller and forwards the call.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use labtrace_core::types::{AnalyteId, MatchReviewId, PendingAnalyteId};
use labtrace_mapping::{MatchReview, PendingAnalyte};

use crate::auth::authenticate;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_pending_analytes(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Json<Vec<PendingAnalyte>>> {
    let caller = authenticate(&state.config, &headers)?.as_admin_caller();
    let rows = labtrace_admin::review::list_pending_analytes(state.pool(), &caller).await?;
    Ok(Json(rows))
}

pub async fn list_pending_reviews(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Json<Vec<MatchReview>>> {
    let caller = authenticate(&state.config, &headers)?.as_admin_caller();
    let rows = labtrace_admin::review::list_pending_reviews(state.pool(), &caller).await?;
    Ok(Json(rows))
}

#[derive(serde::Serialize)]
pub struct ApprovedAnalyte {
    pub analyte_id: AnalyteId,
}

pub async fn approve_pending_analyte(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(pending_analyte_id): Path<PendingAnalyteId>,
) -> ApiResult<Json<ApprovedAnalyte>> {
    let caller = authenticate(&state.config, &headers)?.as_admin_caller();
    let analyte_id =
        labtrace_admin::review::approve_pending_analyte(state.pool(), &caller, pending_analyte_id, state.config.mapping.backfill_threshold).await?;
    Ok(Json(ApprovedAnalyte { analyte_id }))
}

pub async fn discard_pending_analyte(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(pending_analyte_id): Path<PendingAnalyteId>,
) -> ApiResult<StatusCode> {
    let caller = authenticate(&state.config, &headers)?.as_admin_caller();
    labtrace_admin::review::discard_pending_analyte(state.pool(), &caller, pending_analyte_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ResolveMatchReviewRequest {
    pub chosen_analyte_id: AnalyteId,
}

pub async fn resolve_match_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(review_id): Path<MatchReviewId>,
    Json(req): Json<ResolveMatchReviewRequest>,
) -> ApiResult<StatusCode> {
    let caller = authenticate(&state.config, &headers)?.as_admin_caller();
    labtrace_admin::review::resolve_match_review(state.pool(), &caller, review_id, req.chosen_analyte_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn skip_match_review(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(review_id): Path<MatchReviewId>) -> ApiResult<StatusCode> {
    let caller = authenticate(&state.config, &headers)?.as_admin_caller();
    labtrace_admin::review::skip_match_review(state.pool(), &caller, review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/reset — wipes all domain tables, then busts the schema
/// cache so a chat session initialized after the reset doesn't see
/// stale table/column info (`labtrace-admin` has no dependency on
/// `labtrace-schema`, so the cache bust happens here rather than inside
/// `reset_store` itself).
pub async fn reset_store(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let caller = authenticate(&state.config, &headers)?.as_admin_caller();
    labtrace_admin::reset_store(state.pool(), &caller).await?;
    state.schema_cache.bust();
    Ok(StatusCode::NO_CONTENT)
}
