//! Configuration loading for the gateway.
//!
//! Recognized options mirror the table in the design: `server.*`,
//! `auth.*`, `providers.<name>.*`, `routing.*`, `cache.*`, `logging.*`. All
//! string scalars support `${VAR}` / `${VAR:-default}` environment
//! interpolation before the YAML is deserialized into typed config.

mod interpolate;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Either a single key (implicit label `default`) or a `{label: key}` map.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl AuthConfig {
    /// Flattened `{key -> label}` lookup table. Empty means auth is
    /// disabled (every request is `anonymous`).
    pub fn key_table(&self) -> HashMap<String, String> {
        let mut table = HashMap::new();
        if let Some(key) = &self.api_key {
            table.insert(key.clone(), "default".to_string());
        }
        for (label, key) in &self.api_keys {
            table.insert(key.clone(), label.clone());
        }
        table
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    RoundRobin,
    Random,
    FirstAvailable,
    /// Reserved, unused.
    Latency,
}

impl Default for RoutingStrategy {
    fn default() -> Self {
        RoutingStrategy::FirstAvailable
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub default_strategy: RoutingStrategy,
    #[serde(default)]
    pub fallback_chain: Option<Vec<String>>,
    /// `{friendly: {provider: native}}`
    #[serde(default)]
    pub model_aliases: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

impl Default for CacheBackendKind {
    fn default() -> Self {
        CacheBackendKind::Memory
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryCacheConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl: u64,
}

fn default_max_items() -> usize {
    10_000
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            ttl: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisCacheConfig {
    pub url: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "llmux:cache:".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub backend: CacheBackendKind,
    #[serde(default)]
    pub memory: MemoryCacheConfig,
    pub redis: Option<RedisCacheConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub pretty: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            pretty: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Key order of the `providers` mapping as it appeared in the source
    /// YAML. `providers` itself is a `HashMap` and loses that order, so
    /// `ProviderRegistry::from_config` consults this instead of sorting.
    #[serde(skip)]
    pub provider_order: Vec<String>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("loading configuration from {:?}", path);
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Internal(format!("failed to read config file: {e}")))?;
        Self::from_str(&raw)
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(raw)
            .map_err(|e| GatewayError::Internal(format!("failed to parse config: {e}")))?;
        interpolate::interpolate_env(&mut value);

        // serde_yaml::Mapping preserves the source document's key order;
        // capture it here before `providers` is flattened into a HashMap.
        let provider_order = value
            .get("providers")
            .and_then(|v| v.as_mapping())
            .map(|mapping| mapping.keys().filter_map(|k| k.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut config: Config = serde_yaml::from_value(value)
            .map_err(|e| GatewayError::Internal(format!("invalid configuration: {e}")))?;
        config.provider_order = provider_order;
        Ok(config)
    }

    /// Enabled providers: configuration block present and carrying a
    /// non-empty API key.
    pub fn enabled_providers(&self) -> impl Iterator<Item = (&String, &ProviderConfig)> {
        self.providers
            .iter()
            .filter(|(_, p)| p.enabled && p.api_key.as_deref().is_some_and(|k| !k.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000
providers:
  groq:
    enabled: true
    api_key: "gk_test"
    base_url: "https://api.groq.com/openai/v1"
    models:
      - "llama-3.1-70b-versatile"
routing:
  default_strategy: round-robin
  fallback_chain: [groq]
"#;
        let cfg = Config::from_str(yaml).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.routing.default_strategy, RoutingStrategy::RoundRobin);
        assert_eq!(cfg.enabled_providers().count(), 1);
    }

    #[test]
    fn env_interpolation_with_default() {
        std::env::remove_var("LLMUX_TEST_UNSET");
        let yaml = r#"
providers:
  groq:
    enabled: true
    api_key: "${LLMUX_TEST_UNSET:-fallback_key}"
    base_url: "https://api.groq.com/openai/v1"
"#;
        let cfg = Config::from_str(yaml).unwrap();
        assert_eq!(cfg.providers["groq"].api_key.as_deref(), Some("fallback_key"));
    }

    #[test]
    fn disabled_or_keyless_provider_is_excluded() {
        let yaml = r#"
providers:
  groq:
    enabled: true
    base_url: "https://api.groq.com/openai/v1"
  together:
    enabled: false
    api_key: "tk"
    base_url: "https://api.together.xyz/v1"
"#;
        let cfg = Config::from_str(yaml).unwrap();
        assert_eq!(cfg.enabled_providers().count(), 0);
    }
}
