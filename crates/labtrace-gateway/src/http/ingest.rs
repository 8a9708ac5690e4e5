//! POST /reports — upload one lab report artifact (§4.7).
//!
//! The body is the raw file bytes; `Content-Type` supplies the declared
//! mime type and `X-Filename` the original filename. Ingestion runs as a
//! background task so the response returns a job id immediately, mirroring
//! how `labtrace-ingest::run_ingestion` drives a `JobManager` record through
//! to completion rather than blocking the request.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use labtrace_core::types::JobId;
use labtrace_ingest::IngestionInput;

use crate::auth::{authenticate, AuthContext};
use crate::error::ApiResult;
use crate::mapping_trigger::MappingSweep;
use crate::state::AppState;

#[derive(Serialize)]
pub struct IngestAccepted {
    pub job_id: JobId,
}

pub async fn upload_report(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> ApiResult<Json<IngestAccepted>> {
    let AuthContext { user_id, .. } = authenticate(&state.config, &headers)?;

    let declared_mime = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let original_filename = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("upload")
        .to_string();

    let input = IngestionInput {
        owner_user_id: user_id,
        bytes: body.to_vec(),
        declared_mime,
        original_filename,
    };

    let job_id = state.jobs.create();

    let pool = state.pool().clone();
    let jobs = state.jobs.clone();
    let vision = state.vision.clone();
    let content_store = state.content_store.clone();
    let trigger = Arc::new(MappingSweep {
        pool: pool.clone(),
        provider: state.llm.clone() as Arc<dyn labtrace_llm::LlmProvider>,
        chat_model: state.config.providers.chat_model.clone(),
        mapping_config: state.config.mapping.clone(),
    });

    tokio::spawn(async move {
        let result = labtrace_ingest::run_ingestion(job_id, &pool, &jobs, &vision, &content_store, trigger.as_ref(), input).await;
        match result {
            Ok(report_id) => jobs.complete(job_id, json!({ "report_id": report_id })),
            Err(e) => jobs.fail(job_id, e.to_string()),
        }
    });

    Ok(Json(IngestAccepted { job_id }))
}
