pub mod error;
pub mod message;
pub mod traits;
pub mod types;

pub use error::CompanionError;
pub use message::{ChatMessage, Role, TurnReply};
pub use traits::{KeyValueStore, LlmGateway, PersonaSource, ProviderSource, TimerSource};
pub use types::{
    mask_secret, AiService, ConversationState, PersonaProfile, PromptState, ProviderConfig,
    ProviderFamily, TimerPhase, TimerSnapshot, DEFAULT_PERSONA_NAME, DEFAULT_USER_TITLE,
};
