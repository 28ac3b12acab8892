//! Turn Event Logger
//!
//! Conversation events emitted on the `turn_events` target with every text
//! field redacted first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    UserMessage { prompt_state: String, content: String },
    AssistantReply { content: String },
    DistractionCaptured { content: String },
    TurnFailed { kind: String, error_msg: String },
}

impl TurnEvent {
    fn redacted(self) -> Self {
        match self {
            TurnEvent::UserMessage { prompt_state, content } => TurnEvent::UserMessage {
                prompt_state,
                content: redact_sensitive_data(&content),
            },
            TurnEvent::AssistantReply { content } => TurnEvent::AssistantReply {
                content: redact_sensitive_data(&content),
            },
            TurnEvent::DistractionCaptured { content } => TurnEvent::DistractionCaptured {
                content: redact_sensitive_data(&content),
            },
            TurnEvent::TurnFailed { kind, error_msg } => TurnEvent::TurnFailed {
                kind,
                error_msg: redact_sensitive_data(&error_msg),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TurnEventEntry {
    pub character_key: String,
    pub timestamp: DateTime<Utc>,
    pub event: TurnEvent,
}

impl TurnEventEntry {
    pub fn new(character_key: &str, event: TurnEvent) -> Self {
        Self {
            character_key: character_key.to_string(),
            timestamp: Utc::now(),
            event: event.redacted(),
        }
    }
}

pub struct TurnEventLogger;

impl TurnEventLogger {
    /// Log one conversation event for a character.
    pub fn log_event(character_key: &str, event: TurnEvent) {
        let entry = TurnEventEntry::new(character_key, event);
        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "turn_events", character = %entry.character_key, event = %json, "Turn event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_redacted() {
        let entry = TurnEventEntry::new(
            "0",
            TurnEvent::TurnFailed {
                kind: "auth".into(),
                error_msg: "bad key sk-abcdefghijklmnopqrst".into(),
            },
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"turn_failed\""));
        assert!(!json.contains("sk-abcdefghijklmnopqrst"));
    }

    #[test]
    fn logging_without_subscriber_is_harmless() {
        TurnEventLogger::log_event(
            "0",
            TurnEvent::DistractionCaptured {
                content: "remind me to buy milk".into(),
            },
        );
    }
}
