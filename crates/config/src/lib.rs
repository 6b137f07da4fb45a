//! Configuration loading, validation, and management for FleetPilot.
//!
//! Loads configuration from `~/.fleetpilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use fleetpilot_core::context::OperatorIdentity;
use fleetpilot_core::message::DEFAULT_GREETING;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.fleetpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Operator identity reported in every context snapshot
    #[serde(default)]
    pub operator: OperatorConfig,

    /// Deployment environment
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("operator", &self.operator)
            .field("environment", &self.environment)
            .field("agent", &self.agent)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default = "default_operator_id")]
    pub id: String,

    #[serde(default = "default_operator_name")]
    pub name: String,

    #[serde(default = "default_operator_role")]
    pub role: String,
}

fn default_operator_id() -> String {
    OperatorIdentity::default().id
}
fn default_operator_name() -> String {
    OperatorIdentity::default().name
}
fn default_operator_role() -> String {
    OperatorIdentity::default().role
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            id: default_operator_id(),
            name: default_operator_name(),
            role: default_operator_role(),
        }
    }
}

impl From<&OperatorConfig> for OperatorIdentity {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            role: config.role.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_environment")]
    pub name: String,
}

fn default_environment() -> String {
    "development".into()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: default_environment(),
        }
    }
}

/// Knobs for the plan → act → observe loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Tool-call iterations allowed per turn
    #[serde(default = "default_max_loops")]
    pub max_loops: usize,

    /// Recursion depth allowed for the recursive `ask` variant
    #[serde(default = "default_max_ask_depth")]
    pub max_ask_depth: usize,

    /// Per tool execution timeout
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Deadline for draining one model stream
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,

    /// Deadline for the registered page's context getter
    #[serde(default = "default_page_context_timeout")]
    pub page_context_timeout_secs: u64,

    /// Tell the operator when the loop ceiling cuts a turn short
    #[serde(default)]
    pub announce_loop_ceiling: bool,

    /// First message of a fresh conversation
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_max_loops() -> usize {
    5
}
fn default_max_ask_depth() -> usize {
    5
}
fn default_tool_timeout() -> u64 {
    15
}
fn default_stream_timeout() -> u64 {
    60
}
fn default_page_context_timeout() -> u64 {
    5
}
fn default_greeting() -> String {
    DEFAULT_GREETING.into()
}

impl AgentSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn page_context_timeout(&self) -> Duration {
        Duration::from_secs(self.page_context_timeout_secs)
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_loops: default_max_loops(),
            max_ask_depth: default_max_ask_depth(),
            tool_timeout_secs: default_tool_timeout(),
            stream_timeout_secs: default_stream_timeout(),
            page_context_timeout_secs: default_page_context_timeout(),
            announce_loop_ceiling: false,
            greeting: default_greeting(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.fleetpilot/config.toml).
    ///
    /// Also checks environment variables:
    /// - `FLEETPILOT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `FLEETPILOT_PROVIDER`, `FLEETPILOT_MODEL`, `FLEETPILOT_ENV`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("FLEETPILOT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("FLEETPILOT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("FLEETPILOT_MODEL") {
            self.default_model = model;
        }

        if let Ok(env) = std::env::var("FLEETPILOT_ENV") {
            self.environment.name = env;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".fleetpilot")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_loops == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_loops must be at least 1".into(),
            ));
        }

        if self.agent.max_ask_depth == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_ask_depth must be at least 1".into(),
            ));
        }

        if self.agent.tool_timeout_secs == 0
            || self.agent.stream_timeout_secs == 0
            || self.agent.page_context_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be greater than zero".into(),
            ));
        }

        if self.agent.greeting.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.greeting must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Operator identity as used in context snapshots.
    pub fn operator_identity(&self) -> OperatorIdentity {
        OperatorIdentity::from(&self.operator)
    }

    /// Copy with every secret replaced by `***`, for display.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***".to_string());
        let mut copy = self.clone();
        copy.api_key = mask(&self.api_key);
        for provider in copy.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        copy
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            operator: OperatorConfig::default(),
            environment: EnvironmentConfig::default(),
            agent: AgentSettings::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.agent.max_loops, 5);
        assert!(!config.agent.announce_loop_ceiling);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.agent.max_loops, config.agent.max_loops);
        assert_eq!(parsed.agent.greeting, config.agent.greeting);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_loop_ceiling_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_loops = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_loops"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.agent.stream_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_model, "gpt-4o-mini");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "console"

[operator]
name = "Dana"
role = "fleet-engineer"

[environment]
name = "production"

[agent]
max_loops = 3
announce_loop_ceiling = true

[providers.console]
api_url = "http://localhost:8080/api/ai/stream"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, "console");
        assert_eq!(config.operator.name, "Dana");
        assert_eq!(config.operator.id, "op-0001");
        assert_eq!(config.environment.name, "production");
        assert_eq!(config.agent.max_loops, 3);
        assert_eq!(config.agent.tool_timeout_secs, 15);
        assert!(config.agent.announce_loop_ceiling);
        assert_eq!(
            config.providers["console"].api_url.as_deref(),
            Some("http://localhost:8080/api/ai/stream")
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                ..ProviderConfig::default()
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("sk-other"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn operator_identity_conversion() {
        let config = AppConfig::default();
        let identity = config.operator_identity();
        assert_eq!(identity, OperatorIdentity::default());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("max_loops = 5"));
    }

    #[test]
    fn redacted_masks_every_key() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config
            .providers
            .insert("console".into(), ProviderConfig {
                api_key: Some("tok".into()),
                api_url: Some("http://console.local/api".into()),
                ..ProviderConfig::default()
            });

        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(!shown.contains("\"tok\""));
        assert!(shown.contains("http://console.local/api"));
        assert_eq!(config.api_key.as_deref(), Some("sk-secret"));
    }
}
