use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32};
use std::sync::Mutex as StdMutex;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labtrace_core::types::{PatientId, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the conversational log. Mirrors the wire shape the LLM
/// provider expects: an assistant message may carry pending `tool_calls`
/// that the next `Tool`-role messages answer by `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        self.role == ChatRole::Assistant && !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Insight + preview table generated by onboarding (C11), handed to the
/// first turn of a session's system prompt then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingContext {
    pub insight_markdown: String,
    pub preview_table_markdown: String,
}

/// Conversational state for one session. Ephemeral — never persisted.
///
/// Fields needing concurrent mutation from multiple request handlers use
/// interior mutability so a session lookup never blocks unrelated fields;
/// the `processing_lock` in particular must support a non-blocking
/// compare-and-set rather than waiting for a mutex.
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    selected_patient_id: RwLock<Option<PatientId>>,
    messages: StdMutex<Vec<ChatMessage>>,
    current_message_id: RwLock<Option<String>>,
    iteration_count: AtomicU32,
    processing_lock: AtomicBool,
    last_touched_epoch: AtomicI64,
    disconnected: AtomicBool,
    last_sql_result: StdMutex<Option<serde_json::Value>>,
    onboarding_context: StdMutex<Option<OnboardingContext>>,
    initialized: AtomicBool,
}

impl Session {
    pub fn new(
        user_id: UserId,
        selected_patient_id: Option<PatientId>,
        onboarding_context: Option<OnboardingContext>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            created_at: Utc::now(),
            selected_patient_id: RwLock::new(selected_patient_id),
            messages: StdMutex::new(Vec::new()),
            current_message_id: RwLock::new(None),
            iteration_count: AtomicU32::new(0),
            processing_lock: AtomicBool::new(false),
            last_touched_epoch: AtomicI64::new(Utc::now().timestamp()),
            disconnected: AtomicBool::new(false),
            last_sql_result: StdMutex::new(None),
            onboarding_context: StdMutex::new(onboarding_context),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn selected_patient_id(&self) -> Option<PatientId> {
        *self.selected_patient_id.read().expect("lock poisoned")
    }

    pub fn set_selected_patient_id(&self, patient_id: Option<PatientId>) {
        *self.selected_patient_id.write().expect("lock poisoned") = patient_id;
    }

    pub fn append_message(&self, message: ChatMessage) {
        self.messages.lock().expect("lock poisoned").push(message);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().expect("lock poisoned").clone()
    }

    pub fn replace_messages(&self, messages: Vec<ChatMessage>) {
        *self.messages.lock().expect("lock poisoned") = messages;
    }

    pub fn current_message_id(&self) -> Option<String> {
        self.current_message_id.read().expect("lock poisoned").clone()
    }

    pub fn set_current_message_id(&self, id: Option<String>) {
        *self.current_message_id.write().expect("lock poisoned") = id;
    }

    /// Atomic compare-and-set. Returns `true` if this call acquired the
    /// lock, `false` if another turn is already in progress.
    pub fn try_acquire_lock(&self) -> bool {
        self.processing_lock
            .compare_exchange(
                false,
                true,
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn release_lock(&self) {
        self.processing_lock.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn increment_iteration(&self) -> u32 {
        self.iteration_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1
    }

    pub fn reset_iteration(&self) {
        self.iteration_count.store(0, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn touch(&self) {
        self.last_touched_epoch
            .store(Utc::now().timestamp(), std::sync::atomic::Ordering::SeqCst);
    }

    pub fn seconds_since_touch(&self) -> i64 {
        let last = self.last_touched_epoch.load(std::sync::atomic::Ordering::SeqCst);
        (Utc::now().timestamp() - last).max(0)
    }

    pub fn mark_disconnected(&self) {
        self.disconnected.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn take_onboarding_context(&self) -> Option<OnboardingContext> {
        self.onboarding_context.lock().expect("lock poisoned").take()
    }

    pub fn set_last_sql_result(&self, rows: serde_json::Value) {
        *self.last_sql_result.lock().expect("lock poisoned") = Some(rows);
    }

    pub fn last_sql_result(&self) -> Option<serde_json::Value> {
        self.last_sql_result.lock().expect("lock poisoned").clone()
    }

    /// Whether the first-turn system prompt has already been assembled.
    pub fn mark_initialized(&self) -> bool {
        self.initialized
            .compare_exchange(
                false,
                true,
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_lock_is_exclusive() {
        let s = Session::new(UserId::new(), None, None);
        assert!(s.try_acquire_lock());
        assert!(!s.try_acquire_lock());
        s.release_lock();
        assert!(s.try_acquire_lock());
    }

    #[test]
    fn mark_initialized_only_once() {
        let s = Session::new(UserId::new(), None, None);
        assert!(s.mark_initialized());
        assert!(!s.mark_initialized());
    }
}
