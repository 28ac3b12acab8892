//! HTTP gateway to the chat-completion providers.
//!
//! Validates the provider tuple, shapes the request for the provider family,
//! runs it through the retry policy and extracts the reply text.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use focusmate_core::{ChatMessage, CompanionError, LlmGateway, ProviderConfig, ProviderFamily};
use focusmate_logging::redact_sensitive_data;

use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::wire::{
    batch_instruction, classify_failure, parse_gemini_reply, parse_openai_reply, GeminiRequest,
    OpenAiRequest,
};

/// Returned in place of an empty chat reply.
pub const FALLBACK_REPLY: &str = "Sorry, I can't reply right now.";

/// At most this many history messages go out with a chat turn.
pub const DEFAULT_REQUEST_WINDOW: usize = 20;

/// Timeouts, retry and sampling parameters for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    pub timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub temperature: f32,
    pub chat_max_tokens: u32,
    pub batch_max_tokens: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            probe_timeout_ms: 5_000,
            retry_count: 3,
            retry_delay_ms: 1_000,
            temperature: 0.8,
            chat_max_tokens: 150,
            batch_max_tokens: 2048,
        }
    }
}

impl GatewaySettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_count: self.retry_count,
            retry_delay_ms: self.retry_delay_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

pub struct HttpGateway {
    transport: Arc<dyn HttpTransport>,
    settings: GatewaySettings,
    request_window: usize,
}

impl HttpGateway {
    /// Gateway over a fresh `reqwest` client.
    pub fn new(settings: GatewaySettings) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(ReqwestTransport::new()?), settings))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, settings: GatewaySettings) -> Self {
        Self {
            transport,
            settings,
            request_window: DEFAULT_REQUEST_WINDOW,
        }
    }

    pub fn with_request_window(mut self, request_window: usize) -> Self {
        self.request_window = request_window;
        self
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Lightweight reachability check: one GET, short ceiling, no retry.
    pub async fn probe(&self, url: &str) -> Result<(), CompanionError> {
        if url.trim().is_empty() {
            return Err(CompanionError::Validation("probe URL is empty".into()));
        }
        self.execute(
            HttpRequest::get(url.trim()),
            self.settings.probe_timeout(),
            RetryPolicy::single_attempt(),
            "probe",
        )
        .await?;
        info!(url = %redact_sensitive_data(url), "Probe succeeded");
        Ok(())
    }

    async fn execute(
        &self,
        request: HttpRequest,
        timeout: Duration,
        policy: RetryPolicy,
        label: &'static str,
    ) -> Result<String, CompanionError> {
        let started = Instant::now();
        let result = with_retry(&policy, label, |attempt| {
            let transport = Arc::clone(&self.transport);
            let request = request.clone();
            async move {
                debug!(
                    label,
                    attempt,
                    url = %redact_sensitive_data(&request.url),
                    "Dispatching provider request"
                );
                let response = transport.send(request, timeout).await?;
                if response.is_success() {
                    return Ok(response.body);
                }
                let err = classify_failure(response.status, &response.body);
                warn!(
                    label,
                    attempt,
                    status = response.status,
                    kind = err.kind(),
                    error = %redact_sensitive_data(&err.to_string()),
                    "Provider returned an error"
                );
                Err(err)
            }
        })
        .await;

        debug!(
            label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Provider exchange finished"
        );
        result
    }
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), CompanionError> {
    if provider.api_key.trim().is_empty() {
        return Err(CompanionError::Validation("API key is not configured".into()));
    }
    let url = provider.resolved_url();
    if url.is_empty() {
        return Err(CompanionError::Validation("API URL is not configured".into()));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(CompanionError::Validation(format!(
            "API URL must start with http:// or https://, got '{}'",
            redact_sensitive_data(url)
        )));
    }
    Ok(())
}

fn encode<T: Serialize>(body: &T) -> Result<serde_json::Value, CompanionError> {
    serde_json::to_value(body)
        .map_err(|e| CompanionError::Validation(format!("failed to encode request: {e}")))
}

fn bearer(provider: &ProviderConfig) -> String {
    format!("Bearer {}", provider.api_key.trim())
}

#[async_trait]
impl LlmGateway for HttpGateway {
    async fn dispatch(
        &self,
        provider: &ProviderConfig,
        system_prompt: &str,
        history: &[ChatMessage],
        utterance: &str,
    ) -> Result<String, CompanionError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(CompanionError::Validation("message is empty".into()));
        }
        validate_provider(provider)?;
        if provider.service.family() == ProviderFamily::GeminiLike {
            return Err(CompanionError::Validation(format!(
                "{} does not support multi-turn chat",
                provider.service.display_name()
            )));
        }

        let start = history.len().saturating_sub(self.request_window);
        let history = &history[start..];
        let body = encode(&OpenAiRequest::chat(
            provider.resolved_model(),
            system_prompt,
            history,
            utterance,
            self.settings.temperature,
            self.settings.chat_max_tokens,
        ))?;
        let request =
            HttpRequest::post_json(provider.resolved_url(), body).header("Authorization", bearer(provider));

        debug!(
            service = %provider.service,
            model = %provider.resolved_model(),
            key = %provider.masked_key(),
            history = history.len(),
            "Sending chat turn"
        );

        let raw = self
            .execute(request, self.settings.timeout(), self.settings.retry_policy(), "chat")
            .await?;
        let reply = parse_openai_reply(&raw)?;
        let reply = reply.trim();
        if reply.is_empty() {
            warn!(service = %provider.service, "Provider returned empty content");
            return Ok(FALLBACK_REPLY.to_string());
        }
        Ok(reply.to_string())
    }

    async fn dispatch_batch(
        &self,
        provider: &ProviderConfig,
        system_prompt: &str,
        quantity: usize,
    ) -> Result<String, CompanionError> {
        if quantity == 0 {
            return Err(CompanionError::Validation("quantity must be at least 1".into()));
        }
        validate_provider(provider)?;

        let family = provider.service.family();
        let request = match family {
            ProviderFamily::OpenAiCompatible => {
                let instruction = batch_instruction(quantity);
                let body = encode(&OpenAiRequest::batch(
                    provider.resolved_model(),
                    system_prompt,
                    &instruction,
                    self.settings.temperature,
                    self.settings.batch_max_tokens,
                ))?;
                HttpRequest::post_json(provider.resolved_url(), body)
                    .header("Authorization", bearer(provider))
            }
            ProviderFamily::GeminiLike => {
                let body = encode(&GeminiRequest::single_text(
                    system_prompt,
                    self.settings.temperature,
                    self.settings.batch_max_tokens,
                ))?;
                HttpRequest::post_json(provider.resolved_url(), body)
                    .query("key", provider.api_key.trim())
            }
        };

        debug!(
            service = %provider.service,
            key = %provider.masked_key(),
            quantity,
            "Sending phrase batch"
        );

        let raw = self
            .execute(request, self.settings.timeout(), self.settings.retry_policy(), "batch")
            .await?;
        match family {
            ProviderFamily::OpenAiCompatible => parse_openai_reply(&raw),
            ProviderFamily::GeminiLike => parse_gemini_reply(&raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use focusmate_core::{AiService, Role};

    use crate::transport::HttpResponse;

    /// Replays a fixed sequence of outcomes and records every request.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, CompanionError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<HttpResponse, CompanionError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(
            &self,
            request: HttpRequest,
            _timeout: Duration,
        ) -> Result<HttpResponse, CompanionError> {
            self.seen.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "script exhausted")))
        }
    }

    fn fast_settings() -> GatewaySettings {
        GatewaySettings {
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn openai() -> ProviderConfig {
        ProviderConfig::new(AiService::OpenAi, "sk-test-key-123456")
    }

    fn ok_reply(content: &str) -> Result<HttpResponse, CompanionError> {
        Ok(HttpResponse::new(
            200,
            serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
                .to_string(),
        ))
    }

    #[tokio::test]
    async fn server_errors_retry_until_success() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(500, "boom")),
            Ok(HttpResponse::new(500, "boom")),
            ok_reply("Back to work!"),
        ]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());

        let reply = gateway.dispatch(&openai(), "system", &[], "hello").await.unwrap();
        assert_eq!(reply, "Back to work!");
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
            401,
            r#"{"error":{"message":"Incorrect API key"}}"#,
        ))]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());

        let err = gateway.dispatch(&openai(), "system", &[], "hello").await.unwrap_err();
        assert_eq!(err, CompanionError::Auth("Incorrect API key".into()));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let transport = ScriptedTransport::new(vec![
            Err(CompanionError::Network("reset".into())),
            Err(CompanionError::Timeout { timeout_ms: 30_000 }),
            Ok(HttpResponse::new(502, "bad gateway")),
        ]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());

        let err = gateway.dispatch(&openai(), "system", &[], "hello").await.unwrap_err();
        assert!(matches!(err, CompanionError::Server { status: 502, .. }));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn chat_request_shape() {
        let transport = ScriptedTransport::new(vec![ok_reply("ok")]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());
        let history: Vec<ChatMessage> = (0..30)
            .map(|i| ChatMessage::new(Role::User, format!("m{i}"), i))
            .collect();

        gateway
            .dispatch(&openai(), "be a cat", &history, "  hi  ")
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.url, AiService::OpenAi.default_url());
        assert_eq!(request.header_value("Authorization"), Some("Bearer sk-test-key-123456"));
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 150);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1 + DEFAULT_REQUEST_WINDOW + 1);
        assert_eq!(messages[0]["content"], "be a cat");
        assert_eq!(messages[1]["content"], "m10");
        assert_eq!(messages[messages.len() - 1]["content"], "hi");
    }

    #[tokio::test]
    async fn empty_content_becomes_fallback() {
        let transport = ScriptedTransport::new(vec![ok_reply("   ")]);
        let gateway = HttpGateway::with_transport(transport, fast_settings());
        let reply = gateway.dispatch(&openai(), "system", &[], "hello").await.unwrap();
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_network() {
        let transport = ScriptedTransport::new(vec![]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());

        let err = gateway.dispatch(&openai(), "system", &[], "   ").await.unwrap_err();
        assert!(matches!(err, CompanionError::Validation(_)));

        let no_key = ProviderConfig::new(AiService::DeepSeek, "");
        let err = gateway.dispatch(&no_key, "system", &[], "hi").await.unwrap_err();
        assert!(matches!(err, CompanionError::Validation(_)));

        let bad_url = openai().with_url("ftp://example.test");
        let err = gateway.dispatch_batch(&bad_url, "system", 3).await.unwrap_err();
        assert!(matches!(err, CompanionError::Validation(_)));

        let gemini = ProviderConfig::new(AiService::Gemini, "AIzaSecret");
        let err = gateway.dispatch(&gemini, "system", &[], "hi").await.unwrap_err();
        assert!(matches!(err, CompanionError::Validation(_)));

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn gemini_batch_passes_key_as_query() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"one\ntwo"}]}}]}"#,
        ))]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());
        let gemini = ProviderConfig::new(AiService::Gemini, "AIzaSecret");

        let raw = gateway.dispatch_batch(&gemini, "phrase prompt", 2).await.unwrap();
        assert_eq!(raw, "one\ntwo");

        let request = &transport.requests()[0];
        assert_eq!(request.query_value("key"), Some("AIzaSecret"));
        assert_eq!(request.header_value("Authorization"), None);
        assert!(!request.url.contains("AIzaSecret"));
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "phrase prompt");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[tokio::test]
    async fn openai_batch_appends_instruction() {
        let transport = ScriptedTransport::new(vec![ok_reply("a\nb")]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());

        let raw = gateway.dispatch_batch(&openai(), "phrase prompt", 5).await.unwrap();
        assert_eq!(raw, "a\nb");
        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], batch_instruction(5));
    }

    #[tokio::test]
    async fn probe_is_single_attempt() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(503, "down"))]);
        let gateway = HttpGateway::with_transport(transport.clone(), fast_settings());
        let err = gateway.probe("http://127.0.0.1:1/api/health").await.unwrap_err();
        assert!(matches!(err, CompanionError::Server { status: 503, .. }));
        assert_eq!(transport.requests().len(), 1);

        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "{}"))]);
        let gateway = HttpGateway::with_transport(transport, fast_settings());
        assert_eq!(gateway.probe("http://127.0.0.1:1/api/health").await, Ok(()));
    }

    mod live {
        use super::*;
        use axum::http::HeaderMap;
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use serde_json::{json, Value};

        async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let count = body["messages"].as_array().map(Vec::len).unwrap_or(0);
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": format!("{auth}|{count}")}}]
            }))
        }

        async fn slow() -> &'static str {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "late"
        }

        async fn serve() -> String {
            let app = Router::new()
                .route("/v1/chat/completions", post(completions))
                .route("/slow", get(slow));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        #[tokio::test]
        async fn reqwest_round_trip() {
            let base = serve().await;
            let gateway = HttpGateway::new(fast_settings()).unwrap();
            let provider = ProviderConfig::new(AiService::DeepSeek, "sk-live-test")
                .with_url(format!("{base}/v1/chat/completions"))
                .with_model("deepseek-chat");

            let history = vec![ChatMessage::new(Role::Assistant, "welcome", 1)];
            let reply = gateway
                .dispatch(&provider, "system", &history, "hello")
                .await
                .unwrap();
            assert_eq!(reply, "Bearer sk-live-test|3");
        }

        #[tokio::test]
        async fn probe_times_out_at_ceiling() {
            let base = serve().await;
            let gateway = HttpGateway::new(GatewaySettings {
                probe_timeout_ms: 50,
                ..fast_settings()
            })
            .unwrap();
            let err = gateway.probe(&format!("{base}/slow")).await.unwrap_err();
            assert_eq!(err, CompanionError::Timeout { timeout_ms: 50 });
        }
    }
}
