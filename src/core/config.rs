//! Configuration management for Screenwright
//!
//! Supports environment variables, config files, and runtime overrides.
//! Exactly one topology is configured; decoder selection follows from it.
//!
//! Config file location: ~/.config/screenwright/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::core::error::{Result, ScreenwrightError};
use crate::core::types::ScreenSize;

/// Main configuration for Screenwright
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model used by the single actor, or by the planner
    pub actor: ModelConfig,
    /// Model used by the grounder in the planner→grounder topology
    #[serde(default)]
    pub grounder: Option<ModelConfig>,
    /// Model used for the secondary grounding sub-call
    #[serde(default)]
    pub secondary_grounding: Option<ModelConfig>,
    /// Transport retry behaviour
    #[serde(default)]
    pub retry: RetryConfig,
    /// Agent behaviour
    #[serde(default)]
    pub agent: AgentConfig,
    /// Target coordinate space for grid-normalised dialects
    #[serde(default)]
    pub screen: ScreenSize,
    /// Role arrangement and decoding dialect
    #[serde(default)]
    pub community: CommunityConfig,
}

/// Wire dialect of a model endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStyle {
    /// Image and text as separate parts, `choices[0].message` response
    OpenAi,
    /// `x-api-key` auth, `{role, content: [{text}]}` response
    Anthropic,
}

/// One model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub style: WireStyle,
    pub base_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    /// API version header, required by the anthropic style
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ModelConfig {
    /// OpenAI-style endpoint with the default sampling parameters
    pub fn openai(base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            style: WireStyle::OpenAi,
            base_url: base_url.into(),
            model_name: model_name.into(),
            api_key: None,
            proxy: None,
            version: None,
            max_tokens: Some(1500),
            top_p: Some(0.9),
            temperature: Some(1.0),
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        Url::parse(&self.base_url).map_err(|e| {
            ScreenwrightError::config(format!(
                "[{}] invalid base_url '{}': {}",
                section, self.base_url, e
            ))
        })?;

        if self.style == WireStyle::Anthropic && (self.api_key.is_none() || self.version.is_none())
        {
            return Err(ScreenwrightError::config(format!(
                "[{}] anthropic style needs both api_key and version",
                section
            )));
        }

        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let mut config = Self::openai(
            env::var("SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:8000/v1/chat/completions".to_string()),
            env::var("MODEL_NAME").unwrap_or_else(|_| "qwen2.5-vl-72b".to_string()),
        );
        config.api_key = env::var("API_KEY").ok();
        config
    }
}

/// Transport retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_secs: 2,
        }
    }
}

/// Agent behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Completed user/assistant exchanges kept in each conversation
    pub context_window: usize,
    /// Per-call network deadline in seconds
    pub timeout_secs: u64,
    /// Step budget per task
    pub max_steps: usize,
    /// Redact filled text slots in dumped history
    pub hide_text: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            context_window: 3,
            timeout_secs: 60,
            max_steps: env::var("SCREENWRIGHT_MAX_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            hide_text: false,
        }
    }
}

/// How the single actor's output is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ActorMode {
    /// Fenced code blocks
    Fenced,
    /// `<code>…</code>` section, optionally split into one action per statement
    Reasoning {
        #[serde(default)]
        split_statements: bool,
    },
    /// Everything after the last `Action:` marker
    ActionLine,
    /// `Thought/Action` output parsed into structured sub-actions
    StructuredThought,
    /// Actor plans, a secondary grounding call supplies the action
    PlannerWithGrounding,
}

/// Output grammar of the grounder role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrounderDialect {
    Fenced,
    Atlas,
    Uground,
}

/// Arrangement of cooperating model roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topology", rename_all = "snake_case")]
pub enum Topology {
    SingleActor { actor: ActorMode },
    PlannerGrounder { grounder: GrounderDialect },
}

/// Community configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityConfig {
    #[serde(flatten)]
    pub topology: Topology,
    /// Attempts of the secondary grounding sub-call
    pub grounding_attempts: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            topology: Topology::SingleActor {
                actor: ActorMode::Fenced,
            },
            grounding_attempts: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor: ModelConfig::default(),
            grounder: None,
            secondary_grounding: env::var("EXECUTOR_URL")
                .ok()
                .map(|url| ModelConfig::openai(url, "tars1.5-grounding")),
            retry: RetryConfig::default(),
            agent: AgentConfig::default(),
            screen: ScreenSize::default(),
            community: CommunityConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("screenwright")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_path(&Self::config_file()) {
            return config;
        }

        Self::default()
    }

    /// Load configuration from a specific file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScreenwrightError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ScreenwrightError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file();
        self.save_to_path(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    ScreenwrightError::config(format!("Failed to create config dir: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScreenwrightError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ScreenwrightError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Check that URLs parse and the topology has every model it needs
    pub fn validate(&self) -> Result<()> {
        self.actor.validate("actor")?;

        match self.community.topology {
            Topology::PlannerGrounder { .. } => match &self.grounder {
                Some(grounder) => grounder.validate("grounder")?,
                None => {
                    return Err(ScreenwrightError::config(
                        "planner_grounder topology needs a [grounder] section",
                    ))
                }
            },
            Topology::SingleActor {
                actor: ActorMode::PlannerWithGrounding,
            } => match &self.secondary_grounding {
                Some(secondary) => secondary.validate("secondary_grounding")?,
                None => {
                    return Err(ScreenwrightError::config(
                        "planner_with_grounding needs a [secondary_grounding] section (or EXECUTOR_URL)",
                    ))
                }
            },
            Topology::SingleActor { .. } => {}
        }

        if self.community.grounding_attempts == 0 {
            return Err(ScreenwrightError::config(
                "grounding_attempts must be at least 1",
            ));
        }

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_secs, 2);
        assert_eq!(config.actor.max_tokens, Some(1500));
        assert_eq!(config.community.grounding_attempts, 3);
        assert_eq!(config.screen, ScreenSize::new(1280, 800));
    }

    #[test]
    fn test_topology_from_toml() {
        let text = r#"
            [actor]
            style = "openai"
            base_url = "http://localhost:8000/v1/chat/completions"
            model_name = "planner"

            [grounder]
            style = "openai"
            base_url = "http://localhost:8001/v1/chat/completions"
            model_name = "uground"

            [community]
            topology = "planner_grounder"
            grounder = "uground"
            grounding_attempts = 3
        "#;

        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(
            config.community.topology,
            Topology::PlannerGrounder {
                grounder: GrounderDialect::Uground
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_actor_mode_from_toml() {
        let text = r#"
            topology = "single_actor"
            grounding_attempts = 3

            [actor]
            mode = "reasoning"
            split_statements = true
        "#;

        let community: CommunityConfig = toml::from_str(text).unwrap();
        assert_eq!(
            community.topology,
            Topology::SingleActor {
                actor: ActorMode::Reasoning {
                    split_statements: true
                }
            }
        );
    }

    #[test]
    fn test_validate_requires_grounder() {
        let mut config = Config::default();
        config.community.topology = Topology::PlannerGrounder {
            grounder: GrounderDialect::Fenced,
        };
        config.grounder = None;
        assert!(matches!(
            config.validate(),
            Err(ScreenwrightError::Config(_))
        ));
    }

    #[test]
    fn test_validate_anthropic_needs_version() {
        let mut config = Config::default();
        config.actor.style = WireStyle::Anthropic;
        config.actor.api_key = Some("key".into());
        config.actor.version = None;
        assert!(config.validate().is_err());

        config.actor.version = Some("2023-06-01".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.agent.max_steps = 7;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.agent.max_steps, 7);
        assert_eq!(loaded.community.topology, config.community.topology);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from_path(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ScreenwrightError::Config(_))));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("screenwright"));
    }
}
