use anyhow::Result;
use async_trait::async_trait;

use crate::error::CompanionError;
use crate::message::ChatMessage;
use crate::types::{PersonaProfile, ProviderConfig, TimerSnapshot};

/// String key-value storage collaborator (history logs, flags, API profiles).
///
/// Writes are synchronous: once `set` returns, the value is durable for the
/// backend in use.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Resolves the persona for a character key.
pub trait PersonaSource: Send + Sync {
    /// `None` when the character is unknown; callers fall back to defaults.
    fn persona(&self, character_key: &str) -> Option<PersonaProfile>;
}

/// Resolves the active provider tuple.
pub trait ProviderSource: Send + Sync {
    fn active_provider(&self) -> Result<ProviderConfig, CompanionError>;
}

/// Exposes the current focus-timer state.
pub trait TimerSource: Send + Sync {
    fn snapshot(&self) -> TimerSnapshot;
}

/// Transport to a large-language-model provider.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send one chat turn: system prompt, prior history, then the new utterance.
    /// Returns the normalized reply text.
    async fn dispatch(
        &self,
        provider: &ProviderConfig,
        system_prompt: &str,
        history: &[ChatMessage],
        utterance: &str,
    ) -> Result<String, CompanionError>;

    /// Send a one-shot generation request asking for `quantity` lines.
    /// Returns the raw reply text, which may be empty.
    async fn dispatch_batch(
        &self,
        provider: &ProviderConfig,
        system_prompt: &str,
        quantity: usize,
    ) -> Result<String, CompanionError>;
}
