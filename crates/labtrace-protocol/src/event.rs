use serde::{Deserialize, Serialize};

use labtrace_core::types::{PatientId, SessionId};

/// The full SSE event vocabulary (§6). Every variant that carries a
/// `message_id` is subject to the finalization/drop-guard rule enforced by
/// `labtrace-stream::SseRegistry::emit` — see that crate for the mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    SessionStart {
        session_id: SessionId,
        selected_patient_id: Option<PatientId>,
    },
    MessageStart {
        message_id: String,
    },
    Text {
        message_id: String,
        content: String,
    },
    ToolStart {
        message_id: String,
        tool: String,
        params: serde_json::Value,
    },
    ToolComplete {
        message_id: String,
        tool: String,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    PlotResult {
        message_id: String,
        plot_title: String,
        rows: serde_json::Value,
        replace_previous: bool,
    },
    ThumbnailUpdate {
        message_id: String,
        plot_title: String,
        result_id: String,
        thumbnail: String,
    },
    TableResult {
        message_id: String,
        table_title: String,
        rows: serde_json::Value,
        replace_previous: bool,
    },
    MessageEnd {
        message_id: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        debug: Option<String>,
    },
    PatientUnavailable {
        session_id: SessionId,
        selected_patient_id: PatientId,
        message: String,
    },
    SessionExpired {
        reason: String,
    },
    Status {
        status: String,
        message: String,
    },
}

impl ChatEvent {
    /// The `message_id` this event carries, if any. Events without one
    /// (`session_start`, `patient_unavailable`, `session_expired`) are never
    /// subject to the drop guard.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            ChatEvent::MessageStart { message_id }
            | ChatEvent::Text { message_id, .. }
            | ChatEvent::ToolStart { message_id, .. }
            | ChatEvent::ToolComplete { message_id, .. }
            | ChatEvent::PlotResult { message_id, .. }
            | ChatEvent::ThumbnailUpdate { message_id, .. }
            | ChatEvent::TableResult { message_id, .. }
            | ChatEvent::MessageEnd { message_id } => Some(message_id),
            ChatEvent::Error { message_id, .. } => message_id.as_deref(),
            ChatEvent::SessionStart { .. }
            | ChatEvent::PatientUnavailable { .. }
            | ChatEvent::SessionExpired { .. }
            | ChatEvent::Status { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_extraction() {
        let ev = ChatEvent::Text {
            message_id: "m1".to_string(),
            content: "hi".to_string(),
        };
        assert_eq!(ev.message_id(), Some("m1"));

        let ev = ChatEvent::SessionExpired {
            reason: "ttl".to_string(),
        };
        assert_eq!(ev.message_id(), None);
    }

    #[test]
    fn serializes_with_type_tag() {
        let ev = ChatEvent::MessageEnd {
            message_id: "m1".to_string(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "message_end");
        assert_eq!(json["message_id"], "m1");
    }
}
