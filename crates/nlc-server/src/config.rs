//! Server configuration.
//!
//! Read from a TOML file at startup; `NLC_HOST` and `NLC_PORT` override the
//! listen address.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use nlc_pipeline::PipelineConfig;
use nlc_providers::ProvidersConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/nlc/server.toml";

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            pipeline: PipelineConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Self::from_toml(&raw).with_context(|| format!("parsing {}", path.display()))?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `NLC_HOST` / `NLC_PORT` from `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        if let Some(host) = lookup("NLC_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("NLC_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("NLC_PORT is not a port number: {port}"))?;
        }
        Ok(self)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlc_pipeline::ClassifierKind;
    use nlc_providers::BackendConfig;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.providers.entries.is_empty());
    }

    #[test]
    fn example_config_parses() {
        let config = ServerConfig::from_toml(include_str!("../server.example.toml")).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.pipeline.classifier, ClassifierKind::Tiered);
        assert_eq!(config.providers.entries.len(), 2);
        assert_eq!(config.providers.entries[0].id, "local");
        assert!(matches!(
            config.providers.entries[1].backend,
            BackendConfig::Anthropic(_)
        ));
    }

    #[test]
    fn env_overrides_listen_address() {
        let config = ServerConfig::default()
            .with_env_overrides(|key| match key {
                "NLC_HOST" => Some("127.0.0.1".into()),
                "NLC_PORT" => Some("9000".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn bad_port_override_is_an_error() {
        let err = ServerConfig::default()
            .with_env_overrides(|key| (key == "NLC_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("NLC_PORT"));
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = ServerConfig::load(Path::new("/nonexistent/nlc/server.toml")).unwrap();
        assert_eq!(config.pipeline.context_capacity, 10);
    }
}
