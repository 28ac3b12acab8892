use std::fmt;

use serde::{Deserialize, Serialize};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a character's conversation history.
///
/// `id` is the creation time in milliseconds; two messages created in the same
/// millisecond share an id and keep their insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            id: timestamp_ms,
            role,
            content: content.into(),
            timestamp: timestamp_ms,
        }
    }

    pub fn user(content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self::new(Role::User, content, timestamp_ms)
    }

    pub fn assistant(content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self::new(Role::Assistant, content, timestamp_ms)
    }
}

/// Result of a chat turn handed to the UI collaborator.
///
/// `suggested_actions` is part of the contract but is always empty today.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    pub reply: String,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

impl TurnReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            suggested_actions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_entry_serializes_like_stored_log() {
        let msg = ChatMessage::user("hello", 1_700_000_000_000);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["id"], 1_700_000_000_000i64);
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn turn_reply_uses_camel_case() {
        let json = serde_json::to_string(&TurnReply::new("hi")).unwrap();
        assert_eq!(json, r#"{"reply":"hi","suggestedActions":[]}"#);
    }
}
