//! Phrase-batch generation: one-shot prompts for greetings, encouragements
//! and focus reminders, and a tolerant parser for the free-form reply.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use focusmate_companion::{
    build_phrase_prompt, PhraseKind, PhrasePrompt, ReferenceStyle, RemindLevel,
};
use focusmate_core::{
    CompanionError, LlmGateway, PersonaProfile, ProviderConfig, DEFAULT_USER_TITLE,
};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\w*\n?").expect("code fence regex is valid"));
static ENUMERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\d+[.、)][ \t]*").expect("enumeration regex is valid"));
static LEADING_QUOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^["'«»“”‘’„〝〞〟＇＂]"#).expect("leading quote regex is valid")
});
static LINE_BREAKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n+").expect("line break regex is valid"));
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[。；;！!]+").expect("sentence end regex is valid"));

/// Sentence fragments this short are dropped by the fallback split.
const MIN_FRAGMENT_CHARS: usize = 5;

pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}

/// Drop `1.`, `2、`, `3)` style markers at the start of each line.
pub fn strip_enumeration(text: &str) -> String {
    ENUMERATION.replace_all(text, "").into_owned()
}

/// Drop one quote character at the start of each line.
pub fn strip_leading_quotes(text: &str) -> String {
    LEADING_QUOTE.replace_all(text, "").into_owned()
}

pub fn split_lines(text: &str) -> Vec<String> {
    LINE_BREAKS
        .split(text)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|fragment| fragment.chars().count() > MIN_FRAGMENT_CHARS)
        .map(str::to_string)
        .collect()
}

/// Keep the first occurrence of each phrase.
pub fn dedupe(phrases: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    phrases
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Extract at most `quantity` distinct phrases from a model reply.
///
/// Never fails; malformed input yields fewer phrases or none.
pub fn parse_phrases(raw: &str, quantity: usize) -> Vec<String> {
    let cleaned = strip_leading_quotes(&strip_enumeration(&strip_code_fences(raw.trim())));

    let mut phrases = split_lines(&cleaned);
    if phrases.len() < quantity {
        let fragments = split_sentences(&cleaned);
        if fragments.len() > phrases.len() {
            phrases = fragments;
        }
    }

    let mut phrases = dedupe(phrases);
    phrases.truncate(quantity);
    phrases
}

/// Settings for a bulk generation across every phrase kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkPhraseRequest {
    pub character_description: String,
    pub user_title: String,
    pub greeting_count: usize,
    pub encourage_count: usize,
    /// Per reminder level.
    pub remind_count: usize,
    pub remind_levels: Vec<RemindLevel>,
    pub reference_style: Option<ReferenceStyle>,
}

impl Default for BulkPhraseRequest {
    fn default() -> Self {
        Self {
            character_description: String::new(),
            user_title: String::new(),
            greeting_count: 5,
            encourage_count: 10,
            remind_count: 5,
            remind_levels: vec![RemindLevel::Normal, RemindLevel::Annoyed, RemindLevel::Angry],
            reference_style: None,
        }
    }
}

impl BulkPhraseRequest {
    fn prompt(&self, kind: PhraseKind, quantity: usize, remind_level: RemindLevel) -> PhrasePrompt {
        PhrasePrompt {
            kind,
            persona_description: self.character_description.clone(),
            user_title: self.user_title.clone(),
            quantity,
            remind_level,
            reference_style: self.reference_style,
        }
    }
}

/// Result of a bulk generation. A failed category is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhraseBundle {
    pub greetings: Vec<String>,
    pub encouragements: Vec<String>,
    pub reminders: BTreeMap<RemindLevel, Vec<String>>,
}

pub struct PhraseGenerator {
    gateway: Arc<dyn LlmGateway>,
}

impl PhraseGenerator {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Generate up to `request.quantity` phrases of one kind.
    ///
    /// A reply in an unreadable shape yields an empty list.
    pub async fn generate_phrases(
        &self,
        provider: &ProviderConfig,
        request: &PhrasePrompt,
    ) -> Result<Vec<String>, CompanionError> {
        if request.quantity == 0 {
            return Err(CompanionError::Validation("quantity must be at least 1".into()));
        }
        let request = with_persona_defaults(request);
        let prompt = build_phrase_prompt(&request);

        debug!(kind = %request.kind, quantity = request.quantity, "Generating phrases");
        let raw = match self
            .gateway
            .dispatch_batch(provider, &prompt, request.quantity)
            .await
        {
            Ok(raw) => raw,
            Err(CompanionError::Parse(detail)) => {
                warn!(kind = %request.kind, detail = %detail, "Unreadable phrase reply");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let phrases = parse_phrases(&raw, request.quantity);
        if phrases.len() < request.quantity {
            warn!(
                kind = %request.kind,
                requested = request.quantity,
                parsed = phrases.len(),
                "Fewer phrases than requested"
            );
        }
        Ok(phrases)
    }

    /// Generate every category concurrently. Each category that fails comes
    /// back empty without affecting the others.
    pub async fn generate_all(
        &self,
        provider: &ProviderConfig,
        request: &BulkPhraseRequest,
    ) -> PhraseBundle {
        let greetings = self.generate_or_empty(
            provider,
            request.prompt(PhraseKind::Greeting, request.greeting_count, RemindLevel::Normal),
        );
        let encouragements = self.generate_or_empty(
            provider,
            request.prompt(PhraseKind::Encourage, request.encourage_count, RemindLevel::Normal),
        );
        let levels: Vec<RemindLevel> = {
            let mut seen = HashSet::new();
            request
                .remind_levels
                .iter()
                .copied()
                .filter(|l| seen.insert(*l))
                .collect()
        };
        let reminders = join_all(levels.iter().map(|level| {
            self.generate_or_empty(
                provider,
                request.prompt(PhraseKind::Remind, request.remind_count, *level),
            )
        }));

        let (greetings, encouragements, reminders) =
            futures::join!(greetings, encouragements, reminders);

        let bundle = PhraseBundle {
            greetings,
            encouragements,
            reminders: levels.into_iter().zip(reminders).collect(),
        };
        info!(
            greetings = bundle.greetings.len(),
            encouragements = bundle.encouragements.len(),
            reminder_levels = bundle.reminders.len(),
            "Bulk phrase generation finished"
        );
        bundle
    }

    /// Generate a single replacement phrase.
    pub async fn regenerate_single(
        &self,
        provider: &ProviderConfig,
        request: &PhrasePrompt,
    ) -> Result<String, CompanionError> {
        let request = PhrasePrompt {
            quantity: 1,
            ..request.clone()
        };
        self.generate_phrases(provider, &request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CompanionError::Validation("empty result".into()))
    }

    async fn generate_or_empty(&self, provider: &ProviderConfig, request: PhrasePrompt) -> Vec<String> {
        if request.quantity == 0 {
            return Vec::new();
        }
        match self.generate_phrases(provider, &request).await {
            Ok(phrases) => phrases,
            Err(e) => {
                warn!(kind = %request.kind, level = %request.remind_level, error = %e, "Phrase category failed");
                Vec::new()
            }
        }
    }
}

fn with_persona_defaults(request: &PhrasePrompt) -> PhrasePrompt {
    let mut request = request.clone();
    if request.persona_description.trim().is_empty() {
        request.persona_description = PersonaProfile::default().character_description;
    }
    if request.user_title.trim().is_empty() {
        request.user_title = DEFAULT_USER_TITLE.to_string();
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use focusmate_core::AiService;
    use focusmate_llm::MockGateway;

    fn provider() -> ProviderConfig {
        ProviderConfig::new(AiService::OpenAi, "sk-test-123456")
    }

    fn request(kind: PhraseKind, quantity: usize) -> PhrasePrompt {
        PhrasePrompt {
            kind,
            persona_description: "a sleepy cat".into(),
            user_title: "Boss".into(),
            quantity,
            remind_level: RemindLevel::Normal,
            reference_style: None,
        }
    }

    #[test]
    fn numbered_duplicates_are_collapsed() {
        let raw = "1. Hello\n2. Good luck\n2. Good luck\n3. Keep going";
        assert_eq!(parse_phrases(raw, 3), vec!["Hello", "Good luck", "Keep going"]);
    }

    #[test]
    fn fences_markers_and_quotes_are_stripped() {
        let raw = "```text\n1、\"Focus, Boss!\n2) “You can do it\n```";
        assert_eq!(parse_phrases(raw, 5), vec!["Focus, Boss!", "You can do it"]);
    }

    #[test]
    fn falls_back_to_sentence_split() {
        let raw = "Keep at it, Boss! You are doing great today! Almost there now.";
        assert_eq!(
            parse_phrases(raw, 3),
            vec!["Keep at it, Boss", "You are doing great today", "Almost there now."]
        );
    }

    #[test]
    fn short_fragments_do_not_replace_lines() {
        let raw = "Hi! Yo!";
        assert_eq!(parse_phrases(raw, 3), vec!["Hi! Yo!"]);
    }

    #[test]
    fn malformed_input_is_harmless() {
        assert!(parse_phrases("", 3).is_empty());
        assert!(parse_phrases("\n\n```\n```", 3).is_empty());
        assert!(parse_phrases("hello", 0).is_empty());
    }

    #[test]
    fn stages_in_isolation() {
        assert_eq!(strip_code_fences("```json\nabc```"), "abc");
        assert_eq!(strip_enumeration("1. a\n10) b\nc 2. d"), "a\nb\nc 2. d");
        assert_eq!(strip_leading_quotes("'a'\n「b"), "a'\n「b");
        assert_eq!(split_lines(" a \n\n\n b "), vec!["a", "b"]);
        assert_eq!(split_sentences("短句。这是一个足够长的句子！"), vec!["这是一个足够长的句子"]);
        assert_eq!(dedupe(vec!["a".into(), "b".into(), "a".into()]), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn generates_and_truncates() {
        let gateway = Arc::new(MockGateway::new().with_batch_reply("one\ntwo\nthree\nfour"));
        let generator = PhraseGenerator::new(gateway.clone());
        let phrases = generator
            .generate_phrases(&provider(), &request(PhraseKind::Greeting, 3))
            .await
            .unwrap();
        assert_eq!(phrases, vec!["one", "two", "three"]);

        let call = &gateway.calls()[0];
        assert_eq!(call.quantity, Some(3));
        assert!(call.system_prompt.contains("a sleepy cat"));
    }

    #[tokio::test]
    async fn missing_persona_fields_use_defaults() {
        let gateway = Arc::new(MockGateway::new().with_batch_reply("hi"));
        let generator = PhraseGenerator::new(gateway.clone());
        let mut req = request(PhraseKind::Encourage, 1);
        req.persona_description = " ".into();
        req.user_title = String::new();
        generator.generate_phrases(&provider(), &req).await.unwrap();

        let prompt = &gateway.calls()[0].system_prompt;
        assert!(prompt.contains("a gentle, caring companion"));
        assert!(prompt.contains(&format!("\"{DEFAULT_USER_TITLE}\"")));
    }

    #[tokio::test]
    async fn unreadable_reply_yields_empty_list() {
        let gateway = Arc::new(MockGateway::new().fail_next(CompanionError::Parse("bad".into())));
        let generator = PhraseGenerator::new(gateway);
        let phrases = generator
            .generate_phrases(&provider(), &request(PhraseKind::Remind, 5))
            .await
            .unwrap();
        assert!(phrases.is_empty());
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let gateway = Arc::new(MockGateway::new().fail_next(CompanionError::Auth("bad key".into())));
        let generator = PhraseGenerator::new(gateway);
        let err = generator
            .generate_phrases(&provider(), &request(PhraseKind::Remind, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::Auth(_)));
    }

    #[tokio::test]
    async fn bulk_generation_isolates_failures() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_batch_reply("a\nb\nc\nd\ne\nf\ng\nh\ni\nj")
                .with_batch_rule(
                    "encouragements",
                    Err(CompanionError::Server {
                        status: 500,
                        message: "boom".into(),
                    }),
                )
                .with_batch_rule("angry reminder", Ok("Hurry up, Boss!".into())),
        );
        let generator = PhraseGenerator::new(gateway.clone());
        let bundle = generator
            .generate_all(
                &provider(),
                &BulkPhraseRequest {
                    character_description: "a sleepy cat".into(),
                    user_title: "Boss".into(),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(bundle.greetings.len(), 5);
        assert!(bundle.encouragements.is_empty());
        assert_eq!(bundle.reminders[&RemindLevel::Normal].len(), 5);
        assert_eq!(bundle.reminders[&RemindLevel::Annoyed].len(), 5);
        assert_eq!(bundle.reminders[&RemindLevel::Angry], vec!["Hurry up, Boss!"]);
        assert_eq!(gateway.calls().len(), 5);

        let json = serde_json::to_value(&bundle).unwrap();
        assert!(json["reminders"]["angry"].is_array());
    }

    #[tokio::test]
    async fn regenerate_single_requires_a_phrase() {
        let gateway = Arc::new(MockGateway::new().with_batch_reply("Stay strong, Boss\nextra"));
        let generator = PhraseGenerator::new(gateway.clone());
        let phrase = generator
            .regenerate_single(&provider(), &request(PhraseKind::Encourage, 10))
            .await
            .unwrap();
        assert_eq!(phrase, "Stay strong, Boss");
        assert_eq!(gateway.calls()[0].quantity, Some(1));

        let generator = PhraseGenerator::new(Arc::new(MockGateway::new().with_batch_reply("")));
        let err = generator
            .regenerate_single(&provider(), &request(PhraseKind::Encourage, 1))
            .await
            .unwrap_err();
        assert_eq!(err, CompanionError::Validation("empty result".into()));
    }
}
