//! Defines the WebSocket message protocol between the browser client and the API server.
//!
//! Besides the messages below, the server forwards every
//! [`LessonEvent`](lesson_core::LessonEvent) as-is, learner-state updates
//! included; both share the `type` tag.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begins the lesson.
    Start,
    /// Moves past a message that waits for a tap (or skips a timed pause).
    Advance,
    /// Clears everything and plays the lesson from the top.
    Restart,
    /// Clears everything and waits for a new `start`.
    Reset,
    /// Picks an option of the current choice step.
    Choose { index: usize },
    /// Answers the current free-input step.
    Answer { text: String },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once the connection has its own lesson session.
    Initialized {
        session_id: Uuid,
        title: String,
        total_steps: usize,
    },
    /// The interpreter moved.
    Phase { phase: String, index: usize },
    /// A client message could not be applied. The session carries on.
    Rejected { message: String },
    /// Reports a fatal error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_messages_parse() {
        let start: ClientMessage = serde_json::from_str(r#"{"type": "start"}"#).unwrap();
        assert_eq!(start, ClientMessage::Start);

        let reset: ClientMessage = serde_json::from_str(r#"{"type": "reset"}"#).unwrap();
        assert_eq!(reset, ClientMessage::Reset);

        let choose: ClientMessage =
            serde_json::from_str(r#"{"type": "choose", "index": 2}"#).unwrap();
        assert_eq!(choose, ClientMessage::Choose { index: 2 });

        let answer: ClientMessage =
            serde_json::from_str(r#"{"type": "answer", "text": "温度越高"}"#).unwrap();
        assert_eq!(
            answer,
            ClientMessage::Answer {
                text: "温度越高".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_client_messages() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "choose"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"index": 1}"#).is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let msg = ServerMessage::Phase {
            phase: "awaiting_choice".to_string(),
            index: 7,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "phase", "phase": "awaiting_choice", "index": 7})
        );

        let update = lesson_core::LessonEvent::StateUpdate {
            key: "prediction".to_string(),
            value: json!("higher_more"),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"type": "state_update", "key": "prediction", "value": "higher_more"})
        );
    }
}
