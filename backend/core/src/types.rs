use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase reported by the external focus timer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
            TimerPhase::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// The conversational mode that selects the active persona template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PromptState {
    Idle,
    Start,
    Break,
    Finish,
}

impl PromptState {
    pub const ALL: [PromptState; 4] = [
        PromptState::Idle,
        PromptState::Start,
        PromptState::Break,
        PromptState::Finish,
    ];
}

impl fmt::Display for PromptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PromptState::Idle => "idle",
            PromptState::Start => "start",
            PromptState::Break => "break",
            PromptState::Finish => "finish",
        };
        f.write_str(s)
    }
}

/// Raw timer/session state handed over by the timer collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    #[serde(default)]
    pub phase: TimerPhase,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub focus_started_at: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    pub fn new(phase: TimerPhase) -> Self {
        Self {
            phase,
            ..Default::default()
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.current_task = Some(task.into());
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.focus_started_at = Some(at);
        self
    }
}

/// Per-turn view of the timer, recomputed before every turn and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub timer_phase: TimerPhase,
    pub current_task_name: String,
    pub elapsed_focus_secs: u64,
}

impl ConversationState {
    /// Derive the conversation state from a timer snapshot at `now`.
    pub fn from_snapshot(snapshot: &TimerSnapshot, now: DateTime<Utc>) -> Self {
        let elapsed_focus_secs = snapshot
            .focus_started_at
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0);

        Self {
            timer_phase: snapshot.phase,
            current_task_name: snapshot.current_task.clone().unwrap_or_default(),
            elapsed_focus_secs,
        }
    }
}

/// The character a user chats with, supplied by the profile collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersonaProfile {
    #[serde(default = "default_persona_name")]
    pub name: String,
    #[serde(default = "default_user_title")]
    pub user_title: String,
    #[serde(default = "default_relationship")]
    pub relationship: String,
    #[serde(default = "default_character_description")]
    pub character_description: String,
    #[serde(default)]
    pub encourage_styles: Vec<String>,
    #[serde(default)]
    pub reminder_styles: Vec<String>,
}

pub const DEFAULT_PERSONA_NAME: &str = "Xiao Ai";
pub const DEFAULT_USER_TITLE: &str = "Miss";

fn default_persona_name() -> String {
    DEFAULT_PERSONA_NAME.to_string()
}

fn default_user_title() -> String {
    DEFAULT_USER_TITLE.to_string()
}

fn default_relationship() -> String {
    "friend".to_string()
}

fn default_character_description() -> String {
    "a gentle, caring companion".to_string()
}

impl Default for PersonaProfile {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            user_title: default_user_title(),
            relationship: default_relationship(),
            character_description: default_character_description(),
            encourage_styles: Vec::new(),
            reminder_styles: Vec::new(),
        }
    }
}

impl PersonaProfile {
    /// One-line profile summary used by the `{{oc_profile}}` placeholder.
    pub fn summary(&self) -> String {
        format!(
            "{}, {}'s {}, {}",
            self.name, self.user_title, self.relationship, self.character_description
        )
    }
}

/// Wire family shared by a group of LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// `messages` array, bearer auth, `choices[0].message.content`.
    OpenAiCompatible,
    /// Single `contents[].parts[].text`, key in the query string.
    GeminiLike,
}

/// Known AI services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum AiService {
    #[default]
    OpenAi,
    DeepSeek,
    Doubao,
    Gemini,
}

impl AiService {
    pub const ALL: [AiService; 4] = [
        AiService::OpenAi,
        AiService::DeepSeek,
        AiService::Doubao,
        AiService::Gemini,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AiService::OpenAi => "openai",
            AiService::DeepSeek => "deepseek",
            AiService::Doubao => "doubao",
            AiService::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AiService::OpenAi => "OpenAI",
            AiService::DeepSeek => "DeepSeek",
            AiService::Doubao => "Doubao",
            AiService::Gemini => "Gemini",
        }
    }

    pub fn family(&self) -> ProviderFamily {
        match self {
            AiService::Gemini => ProviderFamily::GeminiLike,
            _ => ProviderFamily::OpenAiCompatible,
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            AiService::OpenAi => "https://api.openai.com/v1/chat/completions",
            AiService::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
            AiService::Doubao => "https://ark.cn-beijing.volces.com/api/v3/chat/completions",
            AiService::Gemini => {
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
            }
        }
    }

    pub fn models(&self) -> &'static [&'static str] {
        match self {
            AiService::OpenAi => &["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo", "gpt-4o"],
            AiService::DeepSeek => &["deepseek-chat", "deepseek-coder"],
            AiService::Doubao => &["doubao-pro-4k", "doubao-pro-32k", "doubao-lite-4k"],
            AiService::Gemini => &["gemini-pro", "gemini-pro-vision"],
        }
    }

    /// Resolve a service id; unknown ids fall back to OpenAI.
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "deepseek" => AiService::DeepSeek,
            "doubao" => AiService::Doubao,
            "gemini" => AiService::Gemini,
            _ => AiService::OpenAi,
        }
    }
}

impl From<String> for AiService {
    fn from(value: String) -> Self {
        AiService::from_id(&value)
    }
}

impl From<AiService> for String {
    fn from(value: AiService) -> Self {
        value.id().to_string()
    }
}

impl fmt::Display for AiService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Active provider tuple resolved by the profile collaborator.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    #[serde(rename = "aiService", default)]
    pub service: AiService,
    #[serde(rename = "apiKey", default)]
    pub api_key: String,
    #[serde(rename = "apiUrl", default)]
    pub api_url: String,
    #[serde(rename = "apiModel", default)]
    pub model: String,
}

impl ProviderConfig {
    pub fn new(service: AiService, api_key: impl Into<String>) -> Self {
        Self {
            service,
            api_key: api_key.into(),
            api_url: String::new(),
            model: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Endpoint URL, falling back to the service default when unset.
    pub fn resolved_url(&self) -> &str {
        let url = self.api_url.trim();
        if url.is_empty() {
            self.service.default_url()
        } else {
            url
        }
    }

    /// Model name, falling back to `gpt-3.5-turbo` for the OpenAI family.
    pub fn resolved_model(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty() && self.service.family() == ProviderFamily::OpenAiCompatible {
            DEFAULT_OPENAI_MODEL
        } else {
            model
        }
    }

    /// The key with everything past the first four characters masked.
    pub fn masked_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("service", &self.service)
            .field("api_key", &self.masked_key())
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Show the first four characters of a secret followed by `***`.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    if secret.chars().count() > 4 {
        format!("{}***", secret.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}
