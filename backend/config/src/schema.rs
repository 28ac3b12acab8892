//! FocusMate engine configuration schema.
//!
//! Every section is optional in the file; [`crate::defaults`] fills the gaps
//! after loading.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use focusmate_core::{PersonaProfile, PromptState};
use focusmate_llm::GatewaySettings;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Provider call timeouts, retry and sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// History cap and request windows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryConfig>,

    /// Key-value storage backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// HTTP wrapper bind address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Personas keyed by character key
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub personas: HashMap<String, PersonaProfile>,

    /// System prompt overrides keyed by prompt state
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub templates: HashMap<PromptState, String>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_max_tokens: Option<u32>,
}

impl GatewayConfig {
    /// Gateway settings, unset fields taking the built-in defaults.
    pub fn settings(&self) -> GatewaySettings {
        let d = GatewaySettings::default();
        GatewaySettings {
            timeout_ms: self.timeout_ms.unwrap_or(d.timeout_ms),
            probe_timeout_ms: self.probe_timeout_ms.unwrap_or(d.probe_timeout_ms),
            retry_count: self.retry_count.unwrap_or(d.retry_count),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(d.retry_delay_ms),
            temperature: self.temperature.unwrap_or(d.temperature),
            chat_max_tokens: self.chat_max_tokens.unwrap_or(d.chat_max_tokens),
            batch_max_tokens: self.batch_max_tokens.unwrap_or(d.batch_max_tokens),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Entries kept per character before the oldest are evicted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
    /// Recent messages attached to a chat turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_window: Option<usize>,
    /// Hard cap on history messages in one provider request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_window: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// SQLite database file; relative paths resolve against the config dir.
    /// `:memory:` keeps everything in process memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolled JSON log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// Where the key-value store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    InMemory,
    File(PathBuf),
}

impl EngineConfig {
    pub fn gateway_settings(&self) -> GatewaySettings {
        self.gateway.clone().unwrap_or_default().settings()
    }

    pub fn storage_location(&self, config_dir: &Path) -> StorageLocation {
        let path = self
            .storage
            .as_ref()
            .and_then(|s| s.path.as_deref())
            .unwrap_or(crate::defaults::DEFAULT_STORAGE_FILE);
        if path == ":memory:" {
            return StorageLocation::InMemory;
        }
        let path = PathBuf::from(path);
        if path.is_absolute() {
            StorageLocation::File(path)
        } else {
            StorageLocation::File(config_dir.join(path))
        }
    }

    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        let dir = self
            .logging
            .as_ref()
            .and_then(|l| l.dir.as_deref())
            .unwrap_or(crate::defaults::DEFAULT_LOG_DIR);
        let dir = PathBuf::from(dir);
        if dir.is_absolute() {
            dir
        } else {
            config_dir.join(dir)
        }
    }
}
