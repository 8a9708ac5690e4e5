use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::http;
use crate::state::AppState;

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route("/reports", post(http::ingest::upload_report))
        .route("/jobs/{id}", get(http::jobs::get_job))
        .route("/patients/{patient_id}/insight", post(http::insight::generate_insight))
        .route("/sessions", post(http::sessions::create_session))
        .route("/sessions/{id}/validate", get(http::sessions::validate_session))
        .route("/sessions/{id}/stream", get(http::sessions::open_stream))
        .route("/sessions/{id}/messages", post(http::sessions::post_message))
        .route("/sessions/{id}", delete(http::sessions::delete_session))
        .route("/admin/pending-analytes", get(http::admin::list_pending_analytes))
        .route("/admin/pending-analytes/{id}/approve", post(http::admin::approve_pending_analyte))
        .route("/admin/pending-analytes/{id}", delete(http::admin::discard_pending_analyte))
        .route("/admin/match-reviews", get(http::admin::list_pending_reviews))
        .route("/admin/match-reviews/{id}/resolve", post(http::admin::resolve_match_review))
        .route("/admin/match-reviews/{id}/skip", post(http::admin::skip_match_review))
        .route("/admin/reset", post(http::admin::reset_store))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
