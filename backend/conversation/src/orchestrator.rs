//! Chat turn orchestration.
//!
//! One [`ChatOrchestrator`] serves every character. Each character key gets
//! its own [`CompanionSession`]; at most one turn per key may await the
//! provider at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, Utc};
use tracing::{debug, info, warn};

use focusmate_companion::{is_distraction, TemplateSet, TemplateVars};
use focusmate_core::{
    ChatMessage, CompanionError, ConversationState, KeyValueStore, LlmGateway, PersonaSource,
    PromptState, ProviderConfig, Role, TimerSnapshot, TurnReply,
};
use focusmate_logging::{TurnEvent, TurnEventLogger};
use focusmate_memory::{HistoryStore, DEFAULT_CHAT_WINDOW};

use crate::session::CompanionSession;

const IGNORE_HISTORY_PREFIX: &str = "ignoreHistory_";

/// Storage key of the one-shot "send no history next turn" flag.
pub fn ignore_history_key(character_key: &str) -> String {
    format!("{IGNORE_HISTORY_PREFIX}{character_key}")
}

type Sessions = Mutex<HashMap<String, CompanionSession>>;

fn lock(sessions: &Sessions) -> MutexGuard<'_, HashMap<String, CompanionSession>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight flag when the turn ends, however it ends.
struct TurnGuard<'a> {
    sessions: &'a Sessions,
    character_key: String,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if let Some(session) = lock(self.sessions).get_mut(&self.character_key) {
            session.in_flight = false;
        }
    }
}

pub struct ChatOrchestrator {
    history: Arc<HistoryStore>,
    storage: Arc<dyn KeyValueStore>,
    gateway: Arc<dyn LlmGateway>,
    personas: Arc<dyn PersonaSource>,
    templates: TemplateSet,
    chat_window: usize,
    sessions: Sessions,
}

impl ChatOrchestrator {
    pub fn new(
        history: Arc<HistoryStore>,
        storage: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn LlmGateway>,
        personas: Arc<dyn PersonaSource>,
    ) -> Self {
        Self {
            history,
            storage,
            gateway,
            personas,
            templates: TemplateSet::default(),
            chat_window: DEFAULT_CHAT_WINDOW,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_chat_window(mut self, chat_window: usize) -> Self {
        self.chat_window = chat_window;
        self
    }

    /// Process one user utterance and return the companion's reply.
    ///
    /// Fails with `Busy` without touching the provider when a turn for the
    /// same character is still pending. Provider failures are returned as-is;
    /// callers show `CompanionError::user_message()` to the user. A reply the
    /// provider sent in an unreadable shape degrades to the fixed apology.
    pub async fn handle_turn(
        &self,
        character_key: &str,
        utterance: &str,
        timer: &TimerSnapshot,
        provider: &ProviderConfig,
    ) -> Result<TurnReply, CompanionError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(CompanionError::Validation("message is empty".into()));
        }

        let _guard = self.begin_turn(character_key)?;

        let state = ConversationState::from_snapshot(timer, Utc::now());
        let (prompt_state, distractions) = {
            let mut sessions = lock(&self.sessions);
            let session = sessions.entry(character_key.to_string()).or_default();
            let prompt_state = session.observe(state.timer_phase);
            if prompt_state == PromptState::Start && is_distraction(utterance) {
                session.distractions.push(utterance.to_string());
                debug!(character = %character_key, total = session.distractions.len(), "Distraction parked");
                TurnEventLogger::log_event(
                    character_key,
                    TurnEvent::DistractionCaptured {
                        content: utterance.to_string(),
                    },
                );
            }
            (prompt_state, session.distractions.clone())
        };

        let system_prompt = self.system_prompt(character_key, prompt_state, &state, &distractions)?;

        let window = if self.take_ignore_history(character_key) {
            debug!(character = %character_key, "Sending turn without history");
            Vec::new()
        } else {
            self.history.recent_window(character_key, self.chat_window)
        };

        if let Err(e) = self.history.append(character_key, Role::User, utterance) {
            warn!(character = %character_key, error = %e, "User message not persisted");
        }
        TurnEventLogger::log_event(
            character_key,
            TurnEvent::UserMessage {
                prompt_state: prompt_state.to_string(),
                content: utterance.to_string(),
            },
        );

        info!(
            character = %character_key,
            state = %prompt_state,
            window = window.len(),
            service = %provider.service,
            "Dispatching chat turn"
        );

        match self
            .gateway
            .dispatch(provider, &system_prompt, &window, utterance)
            .await
        {
            Ok(reply) => {
                if let Err(e) = self.history.append(character_key, Role::Assistant, &reply) {
                    warn!(character = %character_key, error = %e, "Assistant reply not persisted");
                }
                TurnEventLogger::log_event(
                    character_key,
                    TurnEvent::AssistantReply {
                        content: reply.clone(),
                    },
                );
                Ok(TurnReply::new(reply))
            }
            Err(err) => {
                TurnEventLogger::log_event(
                    character_key,
                    TurnEvent::TurnFailed {
                        kind: err.kind().to_string(),
                        error_msg: err.to_string(),
                    },
                );
                if let CompanionError::Parse(detail) = &err {
                    warn!(character = %character_key, detail = %detail, "Unreadable reply, answering with apology");
                    return Ok(TurnReply::new(err.user_message()));
                }
                warn!(character = %character_key, kind = err.kind(), "Chat turn failed");
                Err(err)
            }
        }
    }

    fn begin_turn(&self, character_key: &str) -> Result<TurnGuard<'_>, CompanionError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions.entry(character_key.to_string()).or_default();
        if session.in_flight {
            debug!(character = %character_key, "Rejecting turn, previous one still pending");
            return Err(CompanionError::Busy(character_key.to_string()));
        }
        session.in_flight = true;
        Ok(TurnGuard {
            sessions: &self.sessions,
            character_key: character_key.to_string(),
        })
    }

    fn system_prompt(
        &self,
        character_key: &str,
        prompt_state: PromptState,
        state: &ConversationState,
        distractions: &[String],
    ) -> Result<String, CompanionError> {
        let persona = self.personas.persona(character_key);
        let vars = TemplateVars::from_context(persona.as_ref(), state, distractions, &Local::now());
        self.templates.system_prompt(prompt_state, &vars)
    }

    /// Read and clear the one-shot flag. Storage failures count as unset.
    fn take_ignore_history(&self, character_key: &str) -> bool {
        let key = ignore_history_key(character_key);
        let set = match self.storage.get(&key) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(character = %character_key, error = %e, "Failed to read ignore-history flag");
                false
            }
        };
        if set {
            if let Err(e) = self.storage.remove(&key) {
                warn!(character = %character_key, error = %e, "Failed to clear ignore-history flag");
            }
        }
        set
    }

    // -- session controls ----------------------------------------------------

    /// Pin the character's prompt state to `finish` (pomodoro completed).
    pub fn force_finish(&self, character_key: &str) {
        lock(&self.sessions)
            .entry(character_key.to_string())
            .or_default()
            .machine
            .force_finish();
        info!(character = %character_key, "Pomodoro completed, prompt state forced to finish");
    }

    pub fn prompt_state(&self, character_key: &str) -> PromptState {
        lock(&self.sessions)
            .get(character_key)
            .map(|s| s.machine.current())
            .unwrap_or(PromptState::Idle)
    }

    pub fn distractions(&self, character_key: &str) -> Vec<String> {
        lock(&self.sessions)
            .get(character_key)
            .map(|s| s.distractions.clone())
            .unwrap_or_default()
    }

    /// Remove and return every parked distraction.
    pub fn flush_distractions(&self, character_key: &str) -> Vec<String> {
        let flushed = lock(&self.sessions)
            .get_mut(character_key)
            .map(CompanionSession::flush_distractions)
            .unwrap_or_default();
        debug!(character = %character_key, count = flushed.len(), "Distractions flushed");
        flushed
    }

    pub fn is_busy(&self, character_key: &str) -> bool {
        lock(&self.sessions)
            .get(character_key)
            .is_some_and(|s| s.in_flight)
    }

    /// The next turn for this character is sent without history.
    pub fn set_ignore_history(&self, character_key: &str) -> Result<(), CompanionError> {
        self.storage
            .set(&ignore_history_key(character_key), "true")
            .map_err(|e| CompanionError::Storage(e.to_string()))
    }

    pub fn history(&self, character_key: &str) -> Vec<ChatMessage> {
        self.history.load(character_key)
    }

    pub fn clear_history(&self, character_key: &str) -> Result<(), CompanionError> {
        self.history.clear(character_key)
    }

    /// The system prompt the next turn would use, without dispatching or
    /// changing any session state.
    pub fn render_system_prompt(
        &self,
        character_key: &str,
        timer: &TimerSnapshot,
    ) -> Result<String, CompanionError> {
        let state = ConversationState::from_snapshot(timer, Utc::now());
        let (prompt_state, distractions) = {
            let sessions = lock(&self.sessions);
            let mut preview = sessions.get(character_key).cloned().unwrap_or_default();
            (preview.observe(state.timer_phase), preview.distractions)
        };
        self.system_prompt(character_key, prompt_state, &state, &distractions)
    }

    #[cfg(test)]
    fn has_session(&self, character_key: &str) -> bool {
        lock(&self.sessions).contains_key(character_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::Notify;

    use focusmate_companion::PersonaRegistry;
    use focusmate_core::{AiService, PersonaProfile, TimerPhase};
    use focusmate_llm::MockGateway;
    use focusmate_memory::InMemoryStore;

    struct Harness {
        orchestrator: Arc<ChatOrchestrator>,
        gateway: Arc<MockGateway>,
        storage: Arc<InMemoryStore>,
    }

    fn harness(gateway: MockGateway) -> Harness {
        let storage = Arc::new(InMemoryStore::new());
        let history = Arc::new(HistoryStore::new(storage.clone()));
        let gateway = Arc::new(gateway);
        let mut personas = PersonaRegistry::new();
        personas.register(
            "0",
            PersonaProfile {
                name: "Mochi".into(),
                user_title: "Captain".into(),
                ..Default::default()
            },
        );
        let orchestrator = ChatOrchestrator::new(
            history,
            storage.clone(),
            gateway.clone(),
            Arc::new(personas),
        );
        Harness {
            orchestrator: Arc::new(orchestrator),
            gateway,
            storage,
        }
    }

    fn provider() -> ProviderConfig {
        ProviderConfig::new(AiService::OpenAi, "sk-test-123456")
    }

    fn running() -> TimerSnapshot {
        TimerSnapshot::new(TimerPhase::Running)
            .with_task("thesis")
            .started_at(Utc::now() - chrono::Duration::seconds(125))
    }

    #[tokio::test]
    async fn successful_turn_appends_both_messages() {
        let h = harness(MockGateway::new().with_reply("Back to the thesis!"));
        let reply = h
            .orchestrator
            .handle_turn("0", "so bored", &running(), &provider())
            .await
            .unwrap();
        assert_eq!(reply.reply, "Back to the thesis!");
        assert!(reply.suggested_actions.is_empty());

        let log = h.orchestrator.history("0");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[1].content, "Back to the thesis!");

        let call = &h.gateway.calls()[0];
        assert!(call.system_prompt.contains("Mochi"));
        assert!(call.system_prompt.contains("thesis"));
        assert!(call.system_prompt.contains("2 minutes"));
        assert!(call.history.is_empty());
    }

    #[tokio::test]
    async fn history_window_excludes_current_message() {
        let h = harness(MockGateway::new());
        for i in 0..8 {
            h.orchestrator
                .handle_turn("0", &format!("hello {i}"), &TimerSnapshot::default(), &provider())
                .await
                .unwrap();
        }
        let last = h.gateway.calls().pop().unwrap();
        assert_eq!(last.history.len(), DEFAULT_CHAT_WINDOW);
        assert_eq!(last.history.last().unwrap().role, Role::Assistant);
        assert_eq!(last.utterance.as_deref(), Some("hello 7"));
    }

    #[tokio::test]
    async fn second_turn_for_same_character_is_busy() {
        let gate = Arc::new(Notify::new());
        let h = harness(MockGateway::new().gated(gate.clone()));

        let orchestrator = h.orchestrator.clone();
        let first = tokio::spawn(async move {
            orchestrator
                .handle_turn("0", "first", &TimerSnapshot::default(), &provider())
                .await
        });
        while !h.orchestrator.is_busy("0") {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let err = h
            .orchestrator
            .handle_turn("0", "second", &TimerSnapshot::default(), &provider())
            .await
            .unwrap_err();
        assert_eq!(err, CompanionError::Busy("0".into()));
        assert_eq!(h.gateway.calls().len(), 1);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(!h.orchestrator.is_busy("0"));
    }

    #[tokio::test]
    async fn other_characters_are_not_blocked() {
        let gate = Arc::new(Notify::new());
        let h = harness(MockGateway::new().gated(gate.clone()));

        let orchestrator = h.orchestrator.clone();
        let first = tokio::spawn(async move {
            orchestrator
                .handle_turn("0", "first", &TimerSnapshot::default(), &provider())
                .await
        });
        while !h.orchestrator.is_busy("0") {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let orchestrator = h.orchestrator.clone();
        let second = tokio::spawn(async move {
            orchestrator
                .handle_turn("1", "hi", &TimerSnapshot::default(), &provider())
                .await
        });
        while h.gateway.calls().len() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        gate.notify_one();
        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn failure_skips_assistant_entry_and_releases_flag() {
        let h = harness(MockGateway::new().fail_next(CompanionError::Auth("bad key".into())));
        let err = h
            .orchestrator
            .handle_turn("0", "hello", &TimerSnapshot::default(), &provider())
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::Auth(_)));
        assert!(!h.orchestrator.is_busy("0"));

        let log = h.orchestrator.history("0");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::User);

        h.orchestrator
            .handle_turn("0", "again", &TimerSnapshot::default(), &provider())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unreadable_reply_becomes_apology() {
        let h = harness(MockGateway::new().fail_next(CompanionError::Parse("not json".into())));
        let reply = h
            .orchestrator
            .handle_turn("0", "hello", &TimerSnapshot::default(), &provider())
            .await
            .unwrap();
        assert_eq!(reply.reply, "Sorry, I can't reply right now.");
        assert_eq!(h.orchestrator.history("0").len(), 1);
    }

    #[tokio::test]
    async fn ignore_history_is_one_shot() {
        let h = harness(MockGateway::new());
        h.orchestrator
            .handle_turn("0", "hello", &TimerSnapshot::default(), &provider())
            .await
            .unwrap();

        h.orchestrator.set_ignore_history("0").unwrap();
        assert_eq!(
            h.storage.get(&ignore_history_key("0")).unwrap().as_deref(),
            Some("true")
        );
        h.orchestrator
            .handle_turn("0", "fresh start", &TimerSnapshot::default(), &provider())
            .await
            .unwrap();
        assert!(h.gateway.calls()[1].history.is_empty());
        assert_eq!(h.storage.get(&ignore_history_key("0")).unwrap(), None);

        h.orchestrator
            .handle_turn("0", "and now", &TimerSnapshot::default(), &provider())
            .await
            .unwrap();
        assert_eq!(h.gateway.calls()[2].history.len(), 4);
    }

    #[tokio::test]
    async fn ignore_history_cleared_on_failure() {
        let h = harness(MockGateway::new().fail_next(CompanionError::Network("down".into())));
        h.orchestrator.set_ignore_history("0").unwrap();
        assert!(h
            .orchestrator
            .handle_turn("0", "hello", &TimerSnapshot::default(), &provider())
            .await
            .is_err());
        assert_eq!(h.storage.get(&ignore_history_key("0")).unwrap(), None);
    }

    #[tokio::test]
    async fn distractions_only_captured_while_focusing() {
        let h = harness(MockGateway::new());
        let idle = TimerSnapshot::default();
        h.orchestrator
            .handle_turn("0", "remind me to stretch", &idle, &provider())
            .await
            .unwrap();
        assert!(h.orchestrator.distractions("0").is_empty());

        h.orchestrator
            .handle_turn("0", "remind me to buy milk", &running(), &provider())
            .await
            .unwrap();
        h.orchestrator
            .handle_turn("0", "I'm a bit tired", &running(), &provider())
            .await
            .unwrap();
        assert_eq!(h.orchestrator.distractions("0"), vec!["remind me to buy milk"]);

        let paused = TimerSnapshot::new(TimerPhase::Paused);
        h.orchestrator
            .handle_turn("0", "how did I do?", &paused, &provider())
            .await
            .unwrap();
        let call = h.gateway.calls().pop().unwrap();
        assert!(call.system_prompt.contains("remind me to buy milk"));

        assert_eq!(h.orchestrator.flush_distractions("0"), vec!["remind me to buy milk"]);
        assert!(h.orchestrator.distractions("0").is_empty());
    }

    #[tokio::test]
    async fn forced_finish_selects_finish_template() {
        let h = harness(MockGateway::new());
        h.orchestrator
            .handle_turn("0", "remind me to email Bob", &running(), &provider())
            .await
            .unwrap();
        h.orchestrator.force_finish("0");
        assert_eq!(h.orchestrator.prompt_state("0"), PromptState::Finish);

        h.orchestrator
            .handle_turn("0", "done!", &TimerSnapshot::new(TimerPhase::Idle), &provider())
            .await
            .unwrap();
        assert_eq!(h.orchestrator.prompt_state("0"), PromptState::Finish);
        let call = h.gateway.calls().pop().unwrap();
        assert!(call.system_prompt.contains("completed"));
        assert!(call.system_prompt.contains("remind me to email Bob"));

        h.orchestrator
            .handle_turn("0", "next round", &running(), &provider())
            .await
            .unwrap();
        assert_eq!(h.orchestrator.prompt_state("0"), PromptState::Start);
        assert_eq!(h.orchestrator.distractions("0"), vec!["remind me to email Bob"]);

        assert_eq!(h.orchestrator.flush_distractions("0"), vec!["remind me to email Bob"]);
        assert!(h.orchestrator.distractions("0").is_empty());
    }

    #[tokio::test]
    async fn empty_message_rejected_before_dispatch() {
        let h = harness(MockGateway::new());
        let err = h
            .orchestrator
            .handle_turn("0", "   ", &TimerSnapshot::default(), &provider())
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::Validation(_)));
        assert!(h.gateway.calls().is_empty());
        assert!(h.orchestrator.history("0").is_empty());
    }

    #[test]
    fn preview_does_not_mutate_session() {
        let h = harness(MockGateway::new());
        h.orchestrator.force_finish("0");
        let prompt = h
            .orchestrator
            .render_system_prompt("0", &running())
            .unwrap();
        assert!(prompt.contains("focus guardian"));
        assert_eq!(h.orchestrator.prompt_state("0"), PromptState::Finish);
    }

    #[test]
    fn read_only_calls_leave_no_session() {
        let h = harness(MockGateway::new());
        assert_eq!(h.orchestrator.prompt_state("ghost"), PromptState::Idle);
        assert!(h.orchestrator.distractions("ghost").is_empty());
        assert!(h.orchestrator.flush_distractions("ghost").is_empty());
        assert!(!h.orchestrator.is_busy("ghost"));
        assert!(h.orchestrator.history("ghost").is_empty());
        h.orchestrator
            .render_system_prompt("ghost", &running())
            .unwrap();
        assert!(!h.orchestrator.has_session("ghost"));

        h.orchestrator.force_finish("0");
        assert!(h.orchestrator.has_session("0"));
    }

    #[tokio::test]
    async fn clear_history_empties_log() {
        let h = harness(MockGateway::new());
        h.orchestrator
            .handle_turn("0", "hello", &TimerSnapshot::default(), &provider())
            .await
            .unwrap();
        h.orchestrator.clear_history("0").unwrap();
        assert!(h.orchestrator.history("0").is_empty());
    }
}
