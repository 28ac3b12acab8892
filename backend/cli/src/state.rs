use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use focusmate_companion::{PersonaRegistry, TemplateSet};
use focusmate_config::{EngineConfig, ProfileStore, StorageLocation};
use focusmate_conversation::{ChatOrchestrator, PhraseGenerator};
use focusmate_core::{KeyValueStore, LlmGateway};
use focusmate_llm::HttpGateway;
use focusmate_memory::{HistoryStore, SqliteStore};

/// Shared state for API handlers.
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
    pub generator: PhraseGenerator,
    pub profiles: ProfileStore,
}

impl AppState {
    /// Wire the engine from a prepared config.
    pub fn build(config: &EngineConfig, config_dir: &Path) -> Result<Self> {
        let storage: Arc<dyn KeyValueStore> = match config.storage_location(config_dir) {
            StorageLocation::InMemory => Arc::new(SqliteStore::in_memory()?),
            StorageLocation::File(path) => {
                info!(path = %path.display(), "Opening storage");
                Arc::new(
                    SqliteStore::open(&path)
                        .with_context(|| format!("Failed to open storage at {}", path.display()))?,
                )
            }
        };

        let history = config.history.clone().unwrap_or_default();
        let gateway = HttpGateway::new(config.gateway_settings())?;
        let gateway = match history.request_window {
            Some(window) => gateway.with_request_window(window),
            None => gateway,
        };

        Self::assemble(config, storage, Arc::new(gateway))
    }

    /// Wire the engine around an existing store and gateway.
    pub fn assemble(
        config: &EngineConfig,
        storage: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn LlmGateway>,
    ) -> Result<Self> {
        let history_cfg = config.history.clone().unwrap_or_default();
        let history = match history_cfg.max_entries {
            Some(max) => HistoryStore::with_capacity(storage.clone(), max),
            None => HistoryStore::new(storage.clone()),
        };

        let personas = PersonaRegistry::from_map(config.personas.clone());
        let templates = TemplateSet::default().with_overrides(&config.templates);

        let mut orchestrator = ChatOrchestrator::new(
            Arc::new(history),
            storage.clone(),
            gateway.clone(),
            Arc::new(personas),
        )
        .with_templates(templates);
        if let Some(window) = history_cfg.chat_window {
            orchestrator = orchestrator.with_chat_window(window);
        }

        let profiles = ProfileStore::new(storage);
        let existing = profiles.init()?;
        info!(profiles = existing.len(), personas = config.personas.len(), "Engine ready");

        Ok(Self {
            orchestrator,
            generator: PhraseGenerator::new(gateway),
            profiles,
        })
    }
}
