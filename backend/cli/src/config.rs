use focusmate_config::defaults::{DEFAULT_BIND, DEFAULT_LOG_LEVEL, DEFAULT_PORT};
use focusmate_config::EngineConfig;

/// Process-level settings for `focusmate serve`.
///
/// Precedence: CLI flag > environment > config file > built-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
}

impl RuntimeSettings {
    pub fn from_env(engine: &EngineConfig) -> Self {
        Self::from_sources(engine, |name| std::env::var(name).ok())
    }

    fn from_sources(engine: &EngineConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let server = engine.server.clone().unwrap_or_default();
        let logging = engine.logging.clone().unwrap_or_default();

        Self {
            bind_address: env("FOCUSMATE_BIND")
                .filter(|b| !b.trim().is_empty())
                .or(server.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: env("FOCUSMATE_PORT")
                .and_then(|p| p.parse().ok())
                .or(server.port)
                .unwrap_or(DEFAULT_PORT),
            log_level: env("RUST_LOG")
                .or(logging.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    pub fn with_overrides(mut self, bind: Option<String>, port: Option<u16>) -> Self {
        if let Some(bind) = bind {
            self.bind_address = bind;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focusmate_config::schema::ServerConfig;

    #[test]
    fn env_beats_file_and_flags_beat_env() {
        let engine = EngineConfig {
            server: Some(ServerConfig {
                bind: Some("0.0.0.0".into()),
                port: Some(4000),
            }),
            ..Default::default()
        };
        let env = |name: &str| match name {
            "FOCUSMATE_PORT" => Some("5000".to_string()),
            _ => None,
        };

        let settings = RuntimeSettings::from_sources(&engine, env);
        assert_eq!(settings.bind_address, "0.0.0.0");
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.log_level, "info");

        let settings = settings.with_overrides(None, Some(6000));
        assert_eq!(settings.addr(), "0.0.0.0:6000");
    }

    #[test]
    fn unparsable_port_falls_through() {
        let env = |name: &str| (name == "FOCUSMATE_PORT").then(|| "abc".to_string());
        let settings = RuntimeSettings::from_sources(&EngineConfig::default(), env);
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.bind_address, "127.0.0.1");
    }
}
