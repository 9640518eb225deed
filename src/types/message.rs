use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One finalized transcript entry. Ids are monotonic within a session and
/// restart after `reset`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    pub content: String,
    pub timestamp: SystemTime,
}

impl ChatMessage {
    pub(crate) fn new(id: u64, sender: Sender, content: String) -> Self {
        Self {
            id,
            sender,
            content,
            timestamp: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_round_trip_serialization() {
        let message = ChatMessage::new(7, Sender::Agent, "hello".to_string());
        let json = serde_json::to_string(&message).expect("serialize");
        let parsed: ChatMessage = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Sender::User).expect("serialize"),
            serde_json::json!("user")
        );
        assert_eq!(
            serde_json::to_value(Sender::Agent).expect("serialize"),
            serde_json::json!("agent")
        );
    }
}
