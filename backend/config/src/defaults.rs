//! Fill unset config fields with the engine defaults.

use crate::schema::{
    EngineConfig, GatewayConfig, HistoryConfig, LoggingConfig, ServerConfig, StorageConfig,
};
use focusmate_llm::GatewaySettings;

pub const DEFAULT_MAX_ENTRIES: usize = 50;
pub const DEFAULT_CHAT_WINDOW: usize = 10;
pub const DEFAULT_REQUEST_WINDOW: usize = 20;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Relative to the config dir.
pub const DEFAULT_LOG_DIR: &str = "logs";
/// Relative to the config dir.
pub const DEFAULT_STORAGE_FILE: &str = "focusmate.db";

pub fn apply_all_defaults(config: EngineConfig) -> EngineConfig {
    let config = apply_gateway_defaults(config);
    let config = apply_history_defaults(config);
    let config = apply_storage_defaults(config);
    let config = apply_server_defaults(config);
    apply_logging_defaults(config)
}

fn apply_gateway_defaults(mut config: EngineConfig) -> EngineConfig {
    let d = GatewaySettings::default();
    let gw = config.gateway.get_or_insert_with(GatewayConfig::default);
    gw.timeout_ms.get_or_insert(d.timeout_ms);
    gw.probe_timeout_ms.get_or_insert(d.probe_timeout_ms);
    gw.retry_count.get_or_insert(d.retry_count);
    gw.retry_delay_ms.get_or_insert(d.retry_delay_ms);
    gw.temperature.get_or_insert(d.temperature);
    gw.chat_max_tokens.get_or_insert(d.chat_max_tokens);
    gw.batch_max_tokens.get_or_insert(d.batch_max_tokens);
    config
}

fn apply_history_defaults(mut config: EngineConfig) -> EngineConfig {
    let history = config.history.get_or_insert_with(HistoryConfig::default);
    history.max_entries.get_or_insert(DEFAULT_MAX_ENTRIES);
    history.chat_window.get_or_insert(DEFAULT_CHAT_WINDOW);
    history.request_window.get_or_insert(DEFAULT_REQUEST_WINDOW);
    config
}

fn apply_storage_defaults(mut config: EngineConfig) -> EngineConfig {
    let storage = config.storage.get_or_insert_with(StorageConfig::default);
    if storage.path.as_deref().map(str::trim).unwrap_or("").is_empty() {
        storage.path = Some(DEFAULT_STORAGE_FILE.to_string());
    }
    config
}

fn apply_server_defaults(mut config: EngineConfig) -> EngineConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    config
}

fn apply_logging_defaults(mut config: EngineConfig) -> EngineConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.dir.get_or_insert_with(|| DEFAULT_LOG_DIR.to_string());
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let cfg = apply_all_defaults(EngineConfig::default());
        let history = cfg.history.unwrap();
        assert_eq!(history.max_entries, Some(50));
        assert_eq!(history.chat_window, Some(10));
        assert_eq!(history.request_window, Some(20));
        let gw = cfg.gateway.unwrap();
        assert_eq!(gw.timeout_ms, Some(30_000));
        assert_eq!(gw.batch_max_tokens, Some(2048));
        assert_eq!(cfg.server.unwrap().port, Some(3000));
        assert_eq!(cfg.storage.unwrap().path.as_deref(), Some("focusmate.db"));
        assert_eq!(cfg.logging.unwrap().level.as_deref(), Some("info"));
    }

    #[test]
    fn keeps_user_values() {
        let cfg = EngineConfig {
            history: Some(HistoryConfig {
                chat_window: Some(4),
                ..Default::default()
            }),
            gateway: Some(GatewayConfig {
                retry_count: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cfg = apply_all_defaults(cfg);
        assert_eq!(cfg.history.unwrap().chat_window, Some(4));
        assert_eq!(cfg.gateway.unwrap().retry_count, Some(0));
    }
}
