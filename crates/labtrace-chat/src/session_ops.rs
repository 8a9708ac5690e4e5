//! Logical (transport-agnostic) session endpoints from §4.10: create,
//! validate, open-stream, post-message, delete. The actual `axum` routes
//! live in `labtrace-gateway`; this module is what they call into.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::mpsc;

use labtrace_core::types::{PatientId, SessionId, UserId};
use labtrace_protocol::ChatEvent;
use labtrace_sessions::{OnboardingContext, Session, SessionManager};
use labtrace_stream::SseRegistry;

use crate::error::{ChatError, Result};
use crate::patients;

/// **Create session.** Verifies the caller may see `selected_patient_id` (if
/// given) before creating the session, returning `NotFound` rather than a
/// distinct "forbidden" to avoid confirming another owner's patient exists.
pub async fn create_session(
    pool: &PgPool,
    sessions: &SessionManager,
    owner_user_id: UserId,
    selected_patient_id: Option<PatientId>,
    onboarding_context: Option<OnboardingContext>,
) -> Result<Arc<Session>> {
    if let Some(patient_id) = selected_patient_id {
        if !patients::patient_exists(pool, owner_user_id, patient_id).await? {
            return Err(ChatError::PatientNotFound);
        }
    }
    Ok(sessions.create(owner_user_id, selected_patient_id, onboarding_context))
}

/// **Validate session.** Cheap existence + ownership check; does not extend TTL.
pub fn validate_session(sessions: &SessionManager, session_id: SessionId, owner_user_id: UserId) -> Result<()> {
    let session = sessions.peek(session_id).ok_or(ChatError::SessionNotFound)?;
    if session.user_id != owner_user_id {
        return Err(ChatError::SessionNotFound);
    }
    Ok(())
}

/// **Open stream.** Attaches the SSE sink and emits `session_start`.
pub async fn open_stream(sse: &SseRegistry, session_id: SessionId, selected_patient_id: Option<PatientId>, sink: mpsc::Sender<ChatEvent>) {
    sse.attach(session_id, sink);
    sse.emit(session_id, ChatEvent::SessionStart { session_id, selected_patient_id }).await;
}

/// **Post message.** Acquires the session's processing lock atomically,
/// rejecting with `Busy` on contention. The caller schedules
/// [`crate::turn::run_turn`] asynchronously after this returns `Ok`, then
/// releases the lock once the turn finishes.
pub fn acquire_for_message(sessions: &SessionManager, session_id: SessionId, owner_user_id: UserId) -> Result<Arc<Session>> {
    let session = sessions.get(session_id).ok_or(ChatError::SessionNotFound)?;
    if session.user_id != owner_user_id {
        return Err(ChatError::SessionNotFound);
    }
    if !session.try_acquire_lock() {
        return Err(ChatError::Busy);
    }
    Ok(session)
}

/// **Delete session.** Idempotent: closes the SSE sink (if attached) and
/// removes the session; missing sessions are not an error.
pub async fn delete_session(sessions: &SessionManager, sse: &SseRegistry, session_id: SessionId) {
    sse.close(session_id, "session deleted").await;
    let _ = sessions.delete(session_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_wrong_owner() {
        let sessions = SessionManager::new(3600);
        let owner = UserId::new();
        let session = sessions.create(owner, None, None);
        assert!(validate_session(&sessions, session.id, UserId::new()).is_err());
        assert!(validate_session(&sessions, session.id, owner).is_ok());
    }

    #[test]
    fn acquire_for_message_rejects_busy() {
        let sessions = SessionManager::new(3600);
        let owner = UserId::new();
        let session = sessions.create(owner, None, None);
        let first = acquire_for_message(&sessions, session.id, owner).expect("first acquire");
        assert!(matches!(acquire_for_message(&sessions, session.id, owner), Err(ChatError::Busy)));
        first.release_lock();
        assert!(acquire_for_message(&sessions, session.id, owner).is_ok());
    }
}
