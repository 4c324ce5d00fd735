//! Configuration loading from coxswain.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub flows: FlowsConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// Completion provider configuration.
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    /// Name flow steps use to reference this provider.
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model; steps may override it.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key. Falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
        }
    }
}

/// Flow definition file location.
#[derive(Debug, Deserialize)]
pub struct FlowsConfig {
    #[serde(default = "default_flows_path")]
    pub path: PathBuf,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            path: default_flows_path(),
        }
    }
}

/// Audit log location. Absent path disables the audit log.
#[derive(Debug, Deserialize, Default)]
pub struct AuditConfig {
    pub path: Option<PathBuf>,
}

fn default_provider_name() -> String {
    "openai".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_flows_path() -> PathBuf {
    PathBuf::from("flows.toml")
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the provider API key from config or environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.provider.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingApiKey)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("api key not configured: set provider.api_key or OPENAI_API_KEY")]
    MissingApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = Config::parse(
            r#"
            [provider]
            name = "openrouter"
            base_url = "https://openrouter.ai/api/v1"
            model = "gpt-4o"
            api_key = "sk-test"

            [flows]
            path = "my-flows.toml"

            [audit]
            path = "events.db"
        "#,
        )
        .unwrap();

        assert_eq!(config.provider.name, "openrouter");
        assert_eq!(config.provider.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.api_key().unwrap(), "sk-test");
        assert_eq!(config.flows.path, PathBuf::from("my-flows.toml"));
        assert_eq!(config.audit.path, Some(PathBuf::from("events.db")));
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.flows.path, PathBuf::from("flows.toml"));
        assert!(config.audit.path.is_none());
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = Config::parse("[provider\nname = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
