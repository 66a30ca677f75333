//! TOML-based configuration for Agora
//!
//! Inference backend, retrieval tool, session tunables, logging and the
//! default research team are declared in `agora.toml`. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! Use [`AgoraConfigManager`] for lock-free access to the current config.

use crate::research::{AgentSpec, SessionSettings};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Root configuration structure loaded from agora.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgoraConfig {
    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Default research team, in turn order
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

// ============= Inference Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_provider")]
    pub provider: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

fn default_inference_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_inference_timeout() -> u64 {
    120
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_inference_provider(),
            base_url: default_ollama_url(),
            default_model: default_model(),
            timeout_secs: default_inference_timeout(),
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "web" (DuckDuckGo) or "none"
    #[serde(default = "default_retrieval_provider")]
    pub provider: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

fn default_retrieval_provider() -> String {
    "web".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_retrieval_timeout() -> u64 {
    30
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            provider: default_retrieval_provider(),
            max_results: default_max_results(),
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

// ============= Session Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Mean rating at or above which the team has converged
    #[serde(default = "default_threshold")]
    pub satisfaction_threshold: f64,

    /// Memory records shown to the self-improvement prompt
    #[serde(default = "default_memory_window")]
    pub mutation_memory_window: usize,

    /// Prior ideas shown to a brainstorm prompt
    #[serde(default = "default_idea_context")]
    pub max_idea_context: usize,

    /// Per-agent calls in flight at once
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
}

fn default_threshold() -> f64 {
    8.0
}

fn default_memory_window() -> usize {
    10
}

fn default_idea_context() -> usize {
    20
}

fn default_concurrency() -> usize {
    4
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            satisfaction_threshold: default_threshold(),
            mutation_memory_window: default_memory_window(),
            max_idea_context: default_idea_context(),
            max_concurrency: default_concurrency(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,

    pub specialty: String,

    /// Explicit id; derived from the name when omitted
    #[serde(default)]
    pub id: Option<String>,

    /// Overrides `inference.default_model` for this agent
    #[serde(default)]
    pub model: Option<String>,

    /// Initial configuration text; the research persona template when omitted
    #[serde(default)]
    pub configuration: Option<String>,
}

impl From<&AgentConfig> for AgentSpec {
    fn from(agent: &AgentConfig) -> Self {
        let mut spec = AgentSpec::new(agent.name.clone(), agent.specialty.clone());
        spec.id = agent.id.as_deref().map(Into::into);
        spec.model = agent.model.clone();
        spec.configuration = agent.configuration.clone();
        spec
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl AgoraConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AgoraConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.inference.provider.as_str() {
            "ollama" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown inference provider '{}' (supported: ollama)",
                    other
                )))
            }
        }
        if self.inference.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "inference.base_url must not be empty".to_string(),
            ));
        }
        if self.inference.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "inference.default_model must not be empty".to_string(),
            ));
        }
        if self.inference.timeout_secs == 0 || self.retrieval.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least one second".to_string(),
            ));
        }

        match self.retrieval.provider.as_str() {
            "web" | "none" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown retrieval provider '{}' (supported: web, none)",
                    other
                )))
            }
        }

        let threshold = self.session.satisfaction_threshold;
        if !(1.0..=10.0).contains(&threshold) {
            return Err(ConfigError::ValidationError(format!(
                "session.satisfaction_threshold must lie in [1, 10], got {}",
                threshold
            )));
        }
        if self.session.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.session.mutation_memory_window == 0 {
            return Err(ConfigError::ValidationError(
                "session.mutation_memory_window must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "every [[agents]] entry needs a name".to_string(),
                ));
            }
            let id = AgentSpec::from(agent).agent_id();
            if id.as_str().is_empty() || !seen.insert(id.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' has an empty or duplicate id '{}'",
                    agent.name, id
                )));
            }
        }

        Ok(())
    }

    /// Session tunables derived from this configuration
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            satisfaction_threshold: self.session.satisfaction_threshold,
            mutation_memory_window: self.session.mutation_memory_window,
            max_idea_context: self.session.max_idea_context,
            max_concurrency: self.session.max_concurrency,
            default_model: self.inference.default_model.clone(),
            inference_timeout: Duration::from_secs(self.inference.timeout_secs),
            retrieval_timeout: Duration::from_secs(self.retrieval.timeout_secs),
        }
    }

    /// Configured team, or the built-in five when `[[agents]]` is absent
    pub fn default_team(&self) -> Vec<AgentSpec> {
        if self.agents.is_empty() {
            crate::research::default_team()
        } else {
            self.agents.iter().map(AgentSpec::from).collect()
        }
    }
}

/// Starter configuration written by `agora init`
pub fn config_template() -> String {
    format!(
        r#"# Agora configuration

[inference]
provider = "ollama"
base_url = "{base_url}"
default_model = "{model}"
timeout_secs = {inference_timeout}

[retrieval]
# "web" searches DuckDuckGo, "none" runs offline
provider = "web"
max_results = {max_results}
timeout_secs = {retrieval_timeout}

[session]
satisfaction_threshold = {threshold:.1}
mutation_memory_window = {window}
max_idea_context = {ideas}
max_concurrency = {concurrency}

[logging]
level = "info"
json = false

# The default team. Remove these entries to use the built-in five.
[[agents]]
name = "Dr. Neural"
specialty = "Neural Networks and Deep Learning"

[[agents]]
name = "Dr. Ethics"
specialty = "AI Ethics and Safety"

[[agents]]
name = "Dr. NLP"
specialty = "Natural Language Processing"

[[agents]]
name = "Dr. Vision"
specialty = "Computer Vision and Multimodal AI"

[[agents]]
name = "Dr. RL"
specialty = "Reinforcement Learning"
"#,
        base_url = default_ollama_url(),
        model = default_model(),
        inference_timeout = default_inference_timeout(),
        max_results = default_max_results(),
        retrieval_timeout = default_retrieval_timeout(),
        threshold = default_threshold(),
        window = default_memory_window(),
        ideas = default_idea_context(),
        concurrency = default_concurrency(),
    )
}

// ============= Configuration Manager =============

/// Thread-safe configuration holder with manual reload
pub struct AgoraConfigManager {
    config: Arc<ArcSwap<AgoraConfig>>,
    config_path: PathBuf,
}

impl AgoraConfigManager {
    /// Load the config at `path`; a missing file yields the defaults
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let config = AgoraConfig::load_or_default(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
        })
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<AgoraConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Reload the configuration from disk; the old one stays on failure
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = AgoraConfig::load_or_default(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }
}

impl Clone for AgoraConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
        }
    }
}

impl AgoraConfigManager {
    /// Create a config manager directly from a config (useful for testing)
    pub fn from_config(config: AgoraConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("test-config.toml"),
        }
    }
}
