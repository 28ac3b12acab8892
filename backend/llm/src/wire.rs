//! Provider wire formats: request bodies, reply extraction and failure
//! classification for the two provider families.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use focusmate_core::{ChatMessage, CompanionError};
use focusmate_logging::truncate_chars;

/// Raw error bodies are cut to this many characters.
pub const ERROR_BODY_LIMIT: usize = 200;

/// The user instruction sent after the system prompt on the batch path.
pub fn batch_instruction(quantity: usize) -> String {
    format!(
        "Please generate {quantity} phrases. Output them directly, one per line, without numbering."
    )
}

// ---------------------------------------------------------------------------
// OpenAI-compatible family
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OpenAiRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OpenAiMessage<'a>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OpenAiMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

impl<'a> OpenAiRequest<'a> {
    /// System prompt, then history in order, then the new user utterance.
    pub fn chat(
        model: &'a str,
        system_prompt: &'a str,
        history: &'a [ChatMessage],
        utterance: &'a str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(OpenAiMessage {
            role: "system",
            content: system_prompt,
        });
        messages.extend(history.iter().map(|m| OpenAiMessage {
            role: m.role.as_str(),
            content: m.content.as_str(),
        }));
        messages.push(OpenAiMessage {
            role: "user",
            content: utterance,
        });
        Self {
            model,
            messages,
            temperature,
            max_tokens,
        }
    }

    pub fn batch(
        model: &'a str,
        system_prompt: &'a str,
        instruction: &'a str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: system_prompt,
                },
                OpenAiMessage {
                    role: "user",
                    content: instruction,
                },
            ],
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiReply>,
}

#[derive(Debug, Deserialize)]
struct OpenAiReply {
    content: Option<String>,
}

/// `choices[0].message.content`, empty when absent.
pub fn parse_openai_reply(body: &str) -> Result<String, CompanionError> {
    let response: OpenAiResponse = serde_json::from_str(body)
        .map_err(|e| CompanionError::Parse(format!("invalid OpenAI-compatible response: {e}")))?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Gemini-like family
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct GeminiRequest<'a> {
    pub contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct GeminiContent<'a> {
    pub parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
pub struct GeminiPart<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub candidate_count: u32,
}

impl<'a> GeminiRequest<'a> {
    pub fn single_text(text: &'a str, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens,
                candidate_count: 1,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyPart {
    text: Option<String>,
}

/// `candidates[0].content.parts[0].text`, empty when absent.
pub fn parse_gemini_reply(body: &str) -> Result<String, CompanionError> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| CompanionError::Parse(format!("invalid Gemini response: {e}")))?;
    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

fn error_envelope_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(Value::as_str)
        .or_else(|| value.get("message").and_then(Value::as_str))?;
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

/// Map a non-2xx response to the error class callers act on.
pub fn classify_failure(status: u16, body: &str) -> CompanionError {
    let message = error_envelope_message(body).unwrap_or_else(|| {
        format!(
            "API request failed: {status} - {}",
            truncate_chars(body, ERROR_BODY_LIMIT)
        )
    });
    match status {
        401 => CompanionError::Auth(message),
        429 => CompanionError::RateLimited(message),
        500..=599 => CompanionError::Server { status, message },
        _ => CompanionError::Client { status, message },
    }
}
