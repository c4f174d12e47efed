//! Broadcast event types.
//!
//! Every store mutation, heartbeat, and lifecycle transition is fanned out to
//! subscribers as one of these tagged events. The wire shape is a kind string
//! plus a JSON data payload whose structure depends on the kind.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::notifications::Notification;

/// An event delivered to every live subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    /// A new notification was added; carries the full record.
    Notification(Notification),
    /// One notification was deleted by id.
    Delete { id: String },
    /// The whole store was cleared.
    Clear { message: String },
    /// Synthetic keep-alive, emitted by idle feed sessions.
    Heartbeat { timestamp: DateTime<Utc> },
    /// Snapshot of current store contents, sent once per session on connect.
    Init(Vec<Notification>),
    /// Terminal sentinel pushed at process teardown; ends the session.
    Shutdown { message: String },
}

impl BroadcastEvent {
    pub fn heartbeat_now() -> Self {
        Self::Heartbeat {
            timestamp: Utc::now(),
        }
    }

    pub fn clear() -> Self {
        Self::Clear {
            message: "All notifications cleared".to_string(),
        }
    }

    pub fn shutdown() -> Self {
        Self::Shutdown {
            message: "Server shutting down".to_string(),
        }
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::Delete { .. } => "delete",
            Self::Clear { .. } => "clear",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Init(_) => "init",
            Self::Shutdown { .. } => "shutdown",
        }
    }

    /// JSON data payload for the wire.
    pub fn data(&self) -> Value {
        match self {
            Self::Notification(record) => json!(record),
            Self::Delete { id } => json!({ "id": id }),
            Self::Clear { message } => json!({ "message": message }),
            Self::Heartbeat { timestamp } => json!({ "timestamp": timestamp }),
            Self::Init(records) => json!(records),
            Self::Shutdown { message } => json!({ "message": message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn kinds_match_wire_names() {
        assert_eq!(
            BroadcastEvent::Delete {
                id: "x".to_string()
            }
            .kind(),
            "delete"
        );
        assert_eq!(BroadcastEvent::clear().kind(), "clear");
        assert_eq!(BroadcastEvent::heartbeat_now().kind(), "heartbeat");
        assert_eq!(BroadcastEvent::Init(vec![]).kind(), "init");
        assert_eq!(BroadcastEvent::shutdown().kind(), "shutdown");
    }

    #[test]
    fn notification_event_carries_full_record() {
        let mut payload = Map::new();
        payload.insert("message".to_string(), "hi".into());
        let record = Notification::new(payload, Some("n-1".to_string()));
        let event = BroadcastEvent::Notification(record.clone());

        assert_eq!(event.kind(), "notification");
        let data = event.data();
        assert_eq!(data["id"], "n-1");
        assert_eq!(data["data"]["message"], "hi");
        assert!(data["timestamp"].is_string());
    }

    #[test]
    fn delete_event_carries_only_the_id() {
        let data = BroadcastEvent::Delete {
            id: "n-1".to_string(),
        }
        .data();
        assert_eq!(data, serde_json::json!({ "id": "n-1" }));
    }

    #[test]
    fn init_event_serializes_as_array() {
        let data = BroadcastEvent::Init(vec![]).data();
        assert!(data.is_array());
    }
}
