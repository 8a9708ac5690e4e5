//! The five logical session endpoints of §4.10: create, validate,
//! open-stream, post-message, delete. Each is a thin HTTP wrapper around
//! `labtrace_chat::session_ops`; the actual per-turn state machine lives in
//! `labtrace_chat::run_turn`, scheduled here as a detached task so the
//! post-message handler can acknowledge immediately.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive};
use axum::response::Sse;
use axum::Json;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

use labtrace_core::error::ErrorKind;
use labtrace_core::types::{PatientId, SessionId};
use labtrace_sessions::OnboardingContext;

use crate::auth::{authenticate, AuthContext};
use crate::error::ApiResult;
use crate::state::AppState;

const SSE_CHANNEL_CAPACITY: usize = 64;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub selected_patient_id: Option<PatientId>,
    #[serde(default)]
    pub onboarding_context: Option<OnboardingContext>,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

/// POST /sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Json<CreateSessionResponse>> {
    let AuthContext { user_id, .. } = authenticate(&state.config, &headers)?;

    let session = labtrace_chat::session_ops::create_session(
        state.pool(),
        &state.sessions,
        user_id,
        req.selected_patient_id,
        req.onboarding_context,
    )
    .await?;

    Ok(Json(CreateSessionResponse { session_id: session.id }))
}

/// GET /sessions/{id}/validate
pub async fn validate_session(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(session_id): Path<SessionId>) -> ApiResult<StatusCode> {
    let AuthContext { user_id, .. } = authenticate(&state.config, &headers)?;
    labtrace_chat::session_ops::validate_session(&state.sessions, session_id, user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/{id}/stream — SSE body. Opening the stream on an unknown
/// session is not an error: the caller's `validate` call already guards
/// that, and a session can legitimately expire between the two requests.
pub async fn open_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let AuthContext { user_id, .. } = authenticate(&state.config, &headers)?;
    labtrace_chat::session_ops::validate_session(&state.sessions, session_id, user_id)?;

    let selected_patient_id = state.sessions.peek(session_id).and_then(|s| s.selected_patient_id());

    let (tx, rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);
    labtrace_chat::session_ops::open_stream(&state.sse, session_id, selected_patient_id, tx).await;

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event_name(&event)).data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn event_name(event: &labtrace_protocol::ChatEvent) -> &'static str {
    use labtrace_protocol::ChatEvent;
    match event {
        ChatEvent::SessionStart { .. } => "session_start",
        ChatEvent::MessageStart { .. } => "message_start",
        ChatEvent::Text { .. } => "text",
        ChatEvent::ToolStart { .. } => "tool_start",
        ChatEvent::ToolComplete { .. } => "tool_complete",
        ChatEvent::PlotResult { .. } => "plot_result",
        ChatEvent::ThumbnailUpdate { .. } => "thumbnail_update",
        ChatEvent::TableResult { .. } => "table_result",
        ChatEvent::MessageEnd { .. } => "message_end",
        ChatEvent::Error { .. } => "error",
        ChatEvent::PatientUnavailable { .. } => "patient_unavailable",
        ChatEvent::SessionExpired { .. } => "session_expired",
        ChatEvent::Status { .. } => "status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_protocol::ChatEvent;

    #[test]
    fn event_name_matches_wire_tag() {
        let ev = ChatEvent::MessageEnd {
            message_id: "m1".to_string(),
        };
        let tag = serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string();
        assert_eq!(event_name(&ev), tag);
    }

    #[test]
    fn event_name_session_expired() {
        let ev = ChatEvent::SessionExpired { reason: "ttl".to_string() };
        assert_eq!(event_name(&ev), "session_expired");
    }
}

#[derive(Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
}

/// POST /sessions/{id}/messages — acknowledges immediately, runs the turn
/// in the background (§4.10 "Post message").
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<SessionId>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<StatusCode> {
    let AuthContext { user_id, .. } = authenticate(&state.config, &headers)?;

    if req.content.trim().is_empty() {
        return Err(ErrorKind::Validation("message content must not be empty".to_string()).into());
    }

    let session = labtrace_chat::session_ops::acquire_for_message(&state.sessions, session_id, user_id)?;

    let state = state.clone();
    let content = req.content;

    tokio::spawn(async move {
        let deps = labtrace_chat::ChatDeps {
            pool: state.pool(),
            provider: state.llm.as_ref(),
            sse: &state.sse,
            sessions: &state.sessions,
            schema_cache: &state.schema_cache,
            tools: &state.tools,
            model: &state.config.providers.chat_model,
            config: &state.config.chat,
        };
        if let Err(e) = labtrace_chat::run_turn(&deps, session_id, content).await {
            tracing::warn!(session_id = %session_id, error = %e, "chat turn ended with error");
        }
        session.release_lock();
    });

    Ok(StatusCode::ACCEPTED)
}

/// DELETE /sessions/{id}
pub async fn delete_session(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(session_id): Path<SessionId>) -> ApiResult<StatusCode> {
    let AuthContext { user_id, .. } = authenticate(&state.config, &headers)?;
    labtrace_chat::session_ops::validate_session(&state.sessions, session_id, user_id)?;
    labtrace_chat::session_ops::delete_session(&state.sessions, &state.sse, session_id).await;
    Ok(StatusCode::NO_CONTENT)
}
