use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use focusmate_core::{ChatMessage, CompanionError, LlmGateway, ProviderConfig};

/// One call observed by [`MockGateway`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    /// `None` for batch calls.
    pub utterance: Option<String>,
    /// `None` for chat calls.
    pub quantity: Option<usize>,
}

/// A gateway returning canned replies, for exercising callers offline.
#[derive(Default)]
pub struct MockGateway {
    reply: Option<String>,
    batch_reply: Option<String>,
    failures: Mutex<VecDeque<CompanionError>>,
    batch_rules: Vec<(String, Result<String, CompanionError>)>,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn with_batch_reply(mut self, reply: impl Into<String>) -> Self {
        self.batch_reply = Some(reply.into());
        self
    }

    /// Queue an error returned by the next call (chat or batch).
    pub fn fail_next(self, error: CompanionError) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
        self
    }

    /// Batch calls whose system prompt contains `needle` get `outcome`.
    pub fn with_batch_rule(
        mut self,
        needle: impl Into<String>,
        outcome: Result<String, CompanionError>,
    ) -> Self {
        self.batch_rules.push((needle.into(), outcome));
        self
    }

    /// Hold every call until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: RecordedCall) -> Option<CompanionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        self.failures.lock().ok().and_then(|mut f| f.pop_front())
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn dispatch(
        &self,
        _provider: &ProviderConfig,
        system_prompt: &str,
        history: &[ChatMessage],
        utterance: &str,
    ) -> Result<String, CompanionError> {
        let failure = self.record(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            utterance: Some(utterance.to_string()),
            quantity: None,
        });
        self.wait_for_gate().await;
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.reply.clone().unwrap_or_else(|| "Mock reply".to_string()))
    }

    async fn dispatch_batch(
        &self,
        _provider: &ProviderConfig,
        system_prompt: &str,
        quantity: usize,
    ) -> Result<String, CompanionError> {
        let failure = self.record(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: Vec::new(),
            utterance: None,
            quantity: Some(quantity),
        });
        self.wait_for_gate().await;
        if let Some(err) = failure {
            return Err(err);
        }
        if let Some((_, outcome)) = self
            .batch_rules
            .iter()
            .find(|(needle, _)| system_prompt.contains(needle.as_str()))
        {
            return outcome.clone();
        }
        Ok(self.batch_reply.clone().unwrap_or_default())
    }
}
