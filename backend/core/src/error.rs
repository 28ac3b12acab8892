use thiserror::Error;

use crate::types::PromptState;

/// Top-level error type for the companion engine.
///
/// Variants follow the failure classes callers need to tell apart: input
/// validation, provider HTTP classes, transport failures, response shape
/// problems, and engine-internal conditions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompanionError {
    /// Missing or empty required input, rejected before any network call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// HTTP 401 from the provider.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// HTTP 429 from the provider.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// HTTP 5xx from the provider.
    #[error("provider server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Transport-level failure (DNS, connect, reset, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The request hit its timeout ceiling and was aborted.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Any other non-2xx HTTP status.
    #[error("provider rejected request {status}: {message}")]
    Client { status: u16, message: String },

    /// The provider answered 2xx but the body had an unexpected shape.
    #[error("malformed provider response: {0}")]
    Parse(String),

    /// No template is bound to the prompt state. Indicates a programming error.
    #[error("no system prompt template bound for state '{0}'")]
    MissingTemplate(PromptState),

    /// A turn for this character is already in flight.
    #[error("a turn for character '{0}' is already in flight")]
    Busy(String),

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CompanionError {
    /// Whether the gateway may resubmit the request after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompanionError::Server { .. }
                | CompanionError::Network(_)
                | CompanionError::Timeout { .. }
        )
    }

    /// Short, non-technical message safe to show to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            CompanionError::Validation(_) => "Please check your input and API settings.",
            CompanionError::Auth(_) => "The API key was rejected. Please check that it is correct.",
            CompanionError::RateLimited(_) => "Too many requests right now. Please try again later.",
            CompanionError::Server { .. } => "The AI service is temporarily unavailable. Please try again later.",
            CompanionError::Network(_) => "Network connection failed. Please check your network or API address.",
            CompanionError::Timeout { .. } => "The request timed out. Please check your connection and try again.",
            CompanionError::Client { .. } => "The AI service could not handle this request.",
            CompanionError::Parse(_) => "Sorry, I can't reply right now.",
            CompanionError::MissingTemplate(_) => "Sorry, something is off with me right now...",
            CompanionError::Busy(_) => "Still replying, please wait a moment...",
            CompanionError::Storage(_) => "Your chat history could not be saved.",
        }
    }

    /// Stable machine-readable kind, used in logs and API envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            CompanionError::Validation(_) => "validation",
            CompanionError::Auth(_) => "auth",
            CompanionError::RateLimited(_) => "rate_limited",
            CompanionError::Server { .. } => "server",
            CompanionError::Network(_) => "network",
            CompanionError::Timeout { .. } => "timeout",
            CompanionError::Client { .. } => "client",
            CompanionError::Parse(_) => "parse",
            CompanionError::MissingTemplate(_) => "missing_template",
            CompanionError::Busy(_) => "busy",
            CompanionError::Storage(_) => "storage",
        }
    }
}
