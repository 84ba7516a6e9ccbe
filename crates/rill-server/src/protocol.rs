//! WebSocket protocol messages for the rill server.
//!
//! Every message is a JSON object with a `messageType` tag and a `data`
//! payload. Field names inside payloads are camelCase.

use serde::{Deserialize, Serialize};

use rill_core::{WidgetStateRecord, WidgetUpdate};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data")]
pub enum ClientMessage {
    /// A batch of widget value changes.
    #[serde(rename = "WIDGET_STATE_UPDATE")]
    WidgetStateUpdate(Vec<WidgetUpdate>),

    /// Any message type this server does not recognize; ignored.
    #[serde(other)]
    Unknown,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data")]
pub enum ServerMessage {
    /// Full snapshot of the session's widget states, ordered by output slot
    /// index and then cell index.
    #[serde(rename = "WIDGET_STATES")]
    WidgetStates(Vec<WidgetStateRecord>),

    /// Script run lifecycle notification.
    #[serde(rename = "SCRIPT_STATUS")]
    ScriptStatus(ScriptStatus),

    /// Generic error, e.g. a connection for an unknown script name.
    #[serde(rename = "ERROR")]
    Error { message: String },
}

/// Lifecycle status of a script run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptStatus {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScriptStatus {
    pub fn running() -> Self {
        Self {
            status: RunStatus::Running,
            error: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            status: RunStatus::Finished,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(message.into()),
        }
    }
}

/// Run status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::WidgetValue;

    #[test]
    fn widget_state_update_parses_the_wire_shape() {
        let raw = r#"{
            "messageType": "WIDGET_STATE_UPDATE",
            "data": [
                { "widgetKey": "name", "value": "alice" },
                { "widgetKey": "speed", "value": 3.5 }
            ]
        }"#;

        let message: ClientMessage = serde_json::from_str(raw).unwrap();
        let ClientMessage::WidgetStateUpdate(updates) = message else {
            panic!("wrong variant");
        };
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].widget_key, "name");
        assert_eq!(updates[0].value, WidgetValue::Text("alice".to_string()));
        assert_eq!(updates[1].value, WidgetValue::Number(3.5));
    }

    #[test]
    fn unrecognized_message_type_becomes_unknown() {
        let raw = r#"{ "messageType": "HEARTBEAT", "data": [] }"#;
        let message: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));
    }

    #[test]
    fn widget_states_serializes_with_message_type_tag() {
        let message = ServerMessage::WidgetStates(Vec::new());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["messageType"], "WIDGET_STATES");
        assert!(json["data"].as_array().unwrap().is_empty());
    }

    #[test]
    fn script_status_roundtrip() {
        for status in [
            ScriptStatus::running(),
            ScriptStatus::finished(),
            ScriptStatus::error("cell 2 failed"),
        ] {
            let message = ServerMessage::ScriptStatus(status.clone());
            let json = serde_json::to_string(&message).unwrap();
            assert!(json.contains("SCRIPT_STATUS"));
            let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
            let ServerMessage::ScriptStatus(parsed) = parsed else {
                panic!("wrong variant");
            };
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn error_status_carries_the_message() {
        let json = serde_json::to_value(ServerMessage::ScriptStatus(ScriptStatus::error("boom")))
            .unwrap();
        assert_eq!(json["data"]["status"], "ERROR");
        assert_eq!(json["data"]["error"], "boom");
    }
}
