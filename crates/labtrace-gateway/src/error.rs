//! Unified HTTP error mapping (§7): every handler returns `Result<T, ApiError>`,
//! and every per-crate error converts into an `ApiError` by first converting
//! into `labtrace_core::error::ErrorKind` — the same taxonomy carried over
//! SSE (`ChatEvent::Error`) and tool-result JSON, so a client sees the same
//! `code` regardless of which surface reported it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use labtrace_core::error::ErrorKind;

pub struct ApiError(ErrorKind);

impl From<ErrorKind> for ApiError {
    fn from(kind: ErrorKind) -> Self {
        Self(kind)
    }
}

impl From<labtrace_chat::ChatError> for ApiError {
    fn from(e: labtrace_chat::ChatError) -> Self {
        Self(e.into())
    }
}

impl From<labtrace_ingest::IngestError> for ApiError {
    fn from(e: labtrace_ingest::IngestError) -> Self {
        Self(e.into())
    }
}

impl From<labtrace_admin::AdminError> for ApiError {
    fn from(e: labtrace_admin::AdminError) -> Self {
        Self(e.into())
    }
}

impl From<labtrace_insight::InsightError> for ApiError {
    fn from(e: labtrace_insight::InsightError) -> Self {
        Self(e.into())
    }
}

impl From<labtrace_mapping::MappingError> for ApiError {
    fn from(e: labtrace_mapping::MappingError) -> Self {
        Self(e.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self(ErrorKind::from(e))
    }
}

fn status_for(kind: &ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
        ErrorKind::Gone(_) => StatusCode::GONE,
        ErrorKind::Conflict(_) => StatusCode::CONFLICT,
        ErrorKind::ScopeViolation(_) => StatusCode::FORBIDDEN,
        ErrorKind::ProviderTransient(_) => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ProviderRefusal(_) => StatusCode::BAD_GATEWAY,
        ErrorKind::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::IterationCeiling(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::SessionExpired(_) => StatusCode::GONE,
        ErrorKind::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            tracing::warn!(code = self.0.code(), error = %self.0, "request rejected");
        }
        (
            status,
            Json(json!({
                "error": {
                    "code": self.0.code(),
                    "message": self.0.to_string(),
                }
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
