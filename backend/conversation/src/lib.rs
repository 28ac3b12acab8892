//! Conversation orchestration for the FocusMate companion: chat turns bound
//! to the focus timer, and batch generation of persona phrases.

pub mod orchestrator;
pub mod phrases;
pub mod session;

pub use orchestrator::{ignore_history_key, ChatOrchestrator};
pub use phrases::{parse_phrases, BulkPhraseRequest, PhraseBundle, PhraseGenerator};
pub use session::CompanionSession;
