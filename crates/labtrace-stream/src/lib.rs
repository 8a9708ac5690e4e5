use std::sync::RwLock;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use labtrace_core::types::SessionId;
use labtrace_protocol::ChatEvent;

/// Per-session SSE sink plus the drop-guard state ([`ChatEvent::message_id`]
/// of the currently in-flight message). Generalizes the reference
/// architecture's `ws_clients: DashMap<String, mpsc::Sender<String>>` to
/// also carry the session's `currentMessageId` so `emit` can apply the
/// finalization guard without a second lookup.
struct RegistryEntry {
    sink: mpsc::Sender<ChatEvent>,
    current_message_id: RwLock<Option<String>>,
}

/// Map from session id to its attached client sink. The only writer to SSE
/// response streams — every other component calls [`SseRegistry::emit`]
/// rather than holding a sink directly.
pub struct SseRegistry {
    entries: DashMap<SessionId, RegistryEntry>,
}

impl SseRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Attach a sink to a session. Any previously attached sink is replaced
    /// (last-writer-wins); the old sender is simply dropped, which closes
    /// its SSE body stream from the axum side.
    #[instrument(skip(self, sink))]
    pub fn attach(&self, session_id: SessionId, sink: mpsc::Sender<ChatEvent>) {
        self.entries.insert(
            session_id,
            RegistryEntry {
                sink,
                current_message_id: RwLock::new(None),
            },
        );
        debug!(session_id = %session_id, "sse sink attached");
    }

    /// Record which `message_id` is currently in flight for a session, so
    /// events carrying a stale id are dropped rather than delivered.
    pub fn set_current_message_id(&self, session_id: SessionId, message_id: Option<String>) {
        if let Some(entry) = self.entries.get(&session_id) {
            *entry.current_message_id.write().expect("lock poisoned") = message_id;
        }
    }

    /// Emit an event. Silently drops if no sink is attached, the sink is
    /// closed/full, or the event carries a `message_id` that no longer
    /// matches the session's current one.
    #[instrument(skip(self, event))]
    pub async fn emit(&self, session_id: SessionId, event: ChatEvent) {
        let Some(entry) = self.entries.get(&session_id) else {
            return;
        };

        if let Some(mid) = event.message_id() {
            let current = entry.current_message_id.read().expect("lock poisoned").clone();
            if current.as_deref() != Some(mid) {
                debug!(session_id = %session_id, message_id = mid, "dropping stale event");
                return;
            }
        }

        if entry.sink.send(event).await.is_err() {
            warn!(session_id = %session_id, "sse sink closed, dropping event");
        }
    }

    /// Send a synthetic `session_expired` event (if the sink is still open)
    /// then remove the entry.
    #[instrument(skip(self))]
    pub async fn close(&self, session_id: SessionId, reason: &str) {
        if let Some((_, entry)) = self.entries.remove(&session_id) {
            let _ = entry
                .sink
                .send(ChatEvent::SessionExpired {
                    reason: reason.to_string(),
                })
                .await;
        }
    }

    pub fn is_attached(&self, session_id: SessionId) -> bool {
        self.entries.contains_key(&session_id)
    }
}

impl Default for SseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_attach_closes_first_without_dropping_order() {
        let registry = SseRegistry::new();
        let session_id = SessionId::new();

        let (tx1, mut rx1) = mpsc::channel(8);
        registry.attach(session_id, tx1);
        registry.set_current_message_id(session_id, Some("m1".to_string()));
        registry
            .emit(
                session_id,
                ChatEvent::Text {
                    message_id: "m1".to_string(),
                    content: "hi".to_string(),
                },
            )
            .await;

        let (tx2, mut rx2) = mpsc::channel(8);
        registry.attach(session_id, tx2);
        drop(rx1.recv().await); // consume the one message delivered before swap

        registry
            .emit(
                session_id,
                ChatEvent::Text {
                    message_id: "m1".to_string(),
                    content: "after swap".to_string(),
                },
            )
            .await;

        let received = rx2.recv().await.expect("expected event on new sink");
        match received {
            ChatEvent::Text { content, .. } => assert_eq!(content, "after swap"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx1.recv().await.is_none() || rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_drops_events_for_finalized_message() {
        let registry = SseRegistry::new();
        let session_id = SessionId::new();
        let (tx, mut rx) = mpsc::channel(8);
        registry.attach(session_id, tx);
        registry.set_current_message_id(session_id, Some("m1".to_string()));

        registry.set_current_message_id(session_id, None); // finalized

        registry
            .emit(
                session_id,
                ChatEvent::Text {
                    message_id: "m1".to_string(),
                    content: "late".to_string(),
                },
            )
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_sends_session_expired_and_removes_entry() {
        let registry = SseRegistry::new();
        let session_id = SessionId::new();
        let (tx, mut rx) = mpsc::channel(8);
        registry.attach(session_id, tx);

        registry.close(session_id, "ttl").await;

        let received = rx.recv().await.expect("expected session_expired event");
        assert!(matches!(received, ChatEvent::SessionExpired { .. }));
        assert!(!registry.is_attached(session_id));
    }
}
