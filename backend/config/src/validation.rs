//! Config validation: collects every problem in one pass.

use crate::schema::EngineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate(config: &EngineConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_gateway(config, &mut report);
    validate_history(config, &mut report);
    validate_server(config, &mut report);
    validate_logging(config, &mut report);
    validate_personas(config, &mut report);
    validate_templates(config, &mut report);
    report
}

fn validate_gateway(config: &EngineConfig, report: &mut ValidationReport) {
    let Some(gw) = &config.gateway else { return };
    if gw.timeout_ms == Some(0) {
        report.error("gateway.timeoutMs", "timeoutMs must be > 0");
    }
    if gw.probe_timeout_ms == Some(0) {
        report.error("gateway.probeTimeoutMs", "probeTimeoutMs must be > 0");
    }
    if let Some(t) = gw.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.warn(
                "gateway.temperature",
                format!("temperature {t} is outside 0.0..=2.0; providers may reject it"),
            );
        }
    }
    if gw.chat_max_tokens == Some(0) {
        report.error("gateway.chatMaxTokens", "chatMaxTokens must be > 0");
    }
    if gw.batch_max_tokens == Some(0) {
        report.error("gateway.batchMaxTokens", "batchMaxTokens must be > 0");
    }
    if gw.retry_count.is_some_and(|n| n > 10) {
        report.warn("gateway.retryCount", "More than 10 attempts will stall failing turns");
    }
}

fn validate_history(config: &EngineConfig, report: &mut ValidationReport) {
    let Some(history) = &config.history else { return };
    if history.max_entries == Some(0) {
        report.error("history.maxEntries", "maxEntries must be >= 1");
    }
    if history.request_window == Some(0) {
        report.error("history.requestWindow", "requestWindow must be >= 1");
    }
    if let (Some(window), Some(max)) = (history.chat_window, history.max_entries) {
        if window > max {
            report.warn(
                "history.chatWindow",
                format!("chatWindow {window} exceeds maxEntries {max}; only {max} entries exist"),
            );
        }
    }
    if let (Some(window), Some(cap)) = (history.chat_window, history.request_window) {
        if window > cap {
            report.warn(
                "history.chatWindow",
                format!("chatWindow {window} is capped to requestWindow {cap} per request"),
            );
        }
    }
}

fn validate_server(config: &EngineConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    if server.bind.as_deref().is_some_and(|b| b.trim().is_empty()) {
        report.error("server.bind", "bind address cannot be empty");
    }
    if let Some(port) = server.port {
        if port < 1024 && port != 0 {
            report.warn(
                "server.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
}

fn validate_logging(config: &EngineConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error(
            "logging.level",
            format!("Unknown log level '{level}'. Use one of: {}", LOG_LEVELS.join(", ")),
        );
    }
}

fn validate_personas(config: &EngineConfig, report: &mut ValidationReport) {
    for (key, persona) in &config.personas {
        if key.trim().is_empty() {
            report.error("personas", "Character key cannot be empty");
        }
        if persona.name.trim().is_empty() {
            report.warn(format!("personas.{key}.name"), "Persona has an empty name");
        }
    }
}

fn validate_templates(config: &EngineConfig, report: &mut ValidationReport) {
    for (state, template) in &config.templates {
        if template.trim().is_empty() {
            report.warn(
                format!("templates.{state}"),
                "Empty template is ignored; the built-in one is used",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{HistoryConfig, LoggingConfig};

    #[test]
    fn defaults_are_valid() {
        let report = validate(&apply_all_defaults(EngineConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
    }

    #[test]
    fn zero_history_cap_is_error() {
        let cfg = EngineConfig {
            history: Some(HistoryConfig {
                max_entries: Some(0),
                chat_window: Some(10),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "history.maxEntries");
        assert_eq!(report.warnings[0].path, "history.chatWindow");
    }

    #[test]
    fn unknown_log_level_is_error() {
        let cfg = EngineConfig {
            logging: Some(LoggingConfig {
                level: Some("loud".into()),
                dir: None,
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(report.errors[0].message.contains("loud"));
    }
}
