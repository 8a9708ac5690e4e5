use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use labtrace_core::error::ErrorKind;
use labtrace_core::types::JobId;
use labtrace_jobs::JobSnapshot;

use crate::auth::authenticate;
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /jobs/{id} — poll a background job's progress (§6).
pub async fn get_job(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(job_id): Path<JobId>) -> ApiResult<Json<JobSnapshot>> {
    authenticate(&state.config, &headers)?;

    let snapshot = state.jobs.snapshot(job_id).ok_or_else(|| ErrorKind::NotFound("job not found".to_string()))?;
    Ok(Json(snapshot))
}
