use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use focusmate_companion::{PhraseKind, PhrasePrompt, ReferenceStyle, RemindLevel};
use focusmate_config::{redact, ApiProfile};
use focusmate_conversation::{BulkPhraseRequest, PhraseBundle};
use focusmate_core::{
    ChatMessage, CompanionError, ProviderConfig, ProviderSource, TimerSnapshot, TurnReply,
};

use crate::state::AppState;

/// `{success, data}` on success, `{success, error}` on failure.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data: Some(data),
        error: None,
    })
}

pub enum ApiError {
    Companion(CompanionError),
    NotFound(&'static str),
    Internal(anyhow::Error),
}

impl From<CompanionError> for ApiError {
    fn from(e: CompanionError) -> Self {
        ApiError::Companion(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Companion(e) => {
                let status = match &e {
                    CompanionError::Validation(_) => StatusCode::BAD_REQUEST,
                    CompanionError::Busy(_) => StatusCode::CONFLICT,
                    CompanionError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                    CompanionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    CompanionError::MissingTemplate(_) | CompanionError::Storage(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::BAD_GATEWAY,
                };
                warn!(kind = e.kind(), error = %e, "Request failed");
                (status, e.user_message().to_string())
            }
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::Internal(e) => {
                error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong, please try again later.".to_string(),
                )
            }
        };
        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/:key/finish", post(force_finish))
        .route("/api/chat/:key/ignore-history", post(ignore_history))
        .route("/api/chat/:key/distractions", delete(flush_distractions))
        .route("/api/chat/:key/history", get(get_history).delete(clear_history))
        .route("/api/generate", post(generate))
        .route("/api/generate/all", post(generate_all))
        .route("/api/profiles", get(list_profiles).post(save_profile))
        .route("/api/profiles/:id/activate", post(activate_profile))
        .route("/api/profiles/:id", delete(delete_profile))
        .with_state(state)
}

/// Request provider, else the active API profile.
fn resolve_provider(
    state: &AppState,
    provider: Option<ProviderConfig>,
) -> Result<ProviderConfig, CompanionError> {
    match provider {
        Some(p) => Ok(p),
        None => state.profiles.active_provider(),
    }
}

async fn health() -> Json<Envelope<Value>> {
    ok(json!({
        "status": "ok",
        "service": "focusmate",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    character_key: String,
    message: String,
    #[serde(default)]
    timer: TimerSnapshot,
    #[serde(default)]
    provider: Option<ProviderConfig>,
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> ApiResult<TurnReply> {
    if req.character_key.trim().is_empty() {
        return Err(CompanionError::Validation("characterKey is empty".into()).into());
    }
    let provider = resolve_provider(&state, req.provider)?;
    let reply = state
        .orchestrator
        .handle_turn(&req.character_key, &req.message, &req.timer, &provider)
        .await?;
    Ok(ok(reply))
}

async fn force_finish(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> ApiResult<Value> {
    state.orchestrator.force_finish(&key);
    Ok(ok(json!({ "promptState": state.orchestrator.prompt_state(&key) })))
}

async fn ignore_history(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> ApiResult<Value> {
    state.orchestrator.set_ignore_history(&key)?;
    Ok(ok(json!({ "ignoreHistory": true })))
}

async fn flush_distractions(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Vec<String>> {
    Ok(ok(state.orchestrator.flush_distractions(&key)))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Vec<ChatMessage>> {
    Ok(ok(state.orchestrator.history(&key)))
}

async fn clear_history(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> ApiResult<Value> {
    state.orchestrator.clear_history(&key)?;
    Ok(ok(json!({ "cleared": key })))
}

// ---------------------------------------------------------------------------
// Phrase generation
// ---------------------------------------------------------------------------

fn default_quantity() -> usize {
    5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(rename = "type", default)]
    kind: PhraseKind,
    #[serde(default)]
    character_description: String,
    #[serde(default)]
    user_title: String,
    #[serde(default = "default_quantity")]
    quantity: usize,
    #[serde(default)]
    remind_level: Option<String>,
    #[serde(default)]
    reference_style: Option<ReferenceStyle>,
    #[serde(default)]
    provider: Option<ProviderConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    results: Vec<String>,
    #[serde(rename = "type")]
    kind: PhraseKind,
    quantity: usize,
    model: String,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<GenerateResponse> {
    let provider = resolve_provider(&state, req.provider)?;
    let prompt = PhrasePrompt {
        kind: req.kind,
        persona_description: req.character_description,
        user_title: req.user_title,
        quantity: req.quantity,
        remind_level: req
            .remind_level
            .as_deref()
            .map(RemindLevel::from_name)
            .unwrap_or_default(),
        reference_style: req.reference_style,
    };
    let results = state.generator.generate_phrases(&provider, &prompt).await?;
    Ok(ok(GenerateResponse {
        quantity: results.len(),
        results,
        kind: req.kind,
        model: provider.resolved_model().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct GenerateAllRequest {
    #[serde(flatten)]
    request: BulkPhraseRequest,
    #[serde(default)]
    provider: Option<ProviderConfig>,
}

async fn generate_all(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateAllRequest>,
) -> ApiResult<PhraseBundle> {
    let provider = resolve_provider(&state, req.provider)?;
    Ok(ok(state.generator.generate_all(&provider, &req.request).await))
}

// ---------------------------------------------------------------------------
// API profiles
// ---------------------------------------------------------------------------

async fn list_profiles(State(state): State<Arc<AppState>>) -> ApiResult<Value> {
    let profiles = state.profiles.list()?;
    let value = serde_json::to_value(&profiles).map_err(anyhow::Error::from)?;
    Ok(ok(redact(&value)))
}

async fn save_profile(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<ApiProfile>,
) -> ApiResult<Value> {
    let saved = state.profiles.save(profile)?;
    Ok(ok(json!({ "id": saved.id })))
}

async fn activate_profile(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Value> {
    if !state.profiles.list()?.iter().any(|p| p.id == id) {
        return Err(ApiError::NotFound("API profile"));
    }
    state.profiles.set_active(&id)?;
    Ok(ok(json!({ "activeId": id })))
}

async fn delete_profile(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Value> {
    if !state.profiles.delete(&id)? {
        return Err(ApiError::NotFound("API profile"));
    }
    Ok(ok(json!({ "deleted": id, "activeId": state.profiles.active_id()? })))
}
