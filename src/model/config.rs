use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::classification::{CategorySet, DEFAULT_CATEGORIES};

const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment overrides for the classifier section
const ENV_CLASSIFIER_PROVIDER: &str = "CLASSIFIER_PROVIDER";
const ENV_CLASSIFIER_MODEL: &str = "CLASSIFIER_MODEL";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// LLM backend used for classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Groq,
    /// Deterministic keyword classifier, needs no API key
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Mock => "mock",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderKind::Openai),
            "groq" => Some(ProviderKind::Groq),
            "mock" => Some(ProviderKind::Mock),
            _ => None,
        }
    }
}

/// Classification pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model name; provider default when absent
    #[serde(default)]
    pub model: Option<String>,
    /// Override for the OpenAI-compatible endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    2
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_call_timeout_seconds() -> u64 {
    10
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_attempts: default_max_attempts(),
            confidence_threshold: default_confidence_threshold(),
            call_timeout_seconds: default_call_timeout_seconds(),
            categories: default_categories(),
        }
    }
}

impl ClassifierConfig {
    /// Build the validated category set
    pub fn category_set(&self) -> Result<CategorySet, ConfigError> {
        CategorySet::new(self.categories.iter().cloned())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "classifier.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "classifier.confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.call_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "classifier.call_timeout_seconds must be positive".to_string(),
            ));
        }
        self.category_set().map(|_| ())
    }
}

/// Keyword lists for the urgency guardrail
#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailConfig {
    #[serde(default = "default_critical_keywords")]
    pub critical_keywords: Vec<String>,
    #[serde(default = "default_high_keywords")]
    pub high_keywords: Vec<String>,
}

fn default_critical_keywords() -> Vec<String> {
    [
        "urgent",
        "critical",
        "emergency",
        "immediately",
        "production down",
        "crashed",
        "outage",
        "data loss",
        "security breach",
        "hacked",
        "can't work",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_high_keywords() -> Vec<String> {
    [
        "asap",
        "blocking",
        "blocked",
        "cannot",
        "can't access",
        "not working",
        "important",
        "priority",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            critical_keywords: default_critical_keywords(),
            high_keywords: default_high_keywords(),
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub guardrails: GuardrailConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            guardrails: GuardrailConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();
        let mut classifier = file.classifier;

        if let Ok(provider) = std::env::var(ENV_CLASSIFIER_PROVIDER) {
            match ProviderKind::parse(&provider) {
                Some(kind) => classifier.provider = kind,
                None => {
                    tracing::warn!(provider = %provider, "Unknown classifier provider, keeping configured value")
                }
            }
        }

        if let Ok(model) = std::env::var(ENV_CLASSIFIER_MODEL)
            && !model.trim().is_empty()
        {
            classifier.model = Some(model);
        }

        Self {
            classifier,
            guardrails: file.guardrails,
            port,
            host,
        }
    }

    /// Parse configuration from YAML text
    pub fn parse_config_file(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
        let contents = contents.trim();
        if contents.is_empty() {
            return Ok(ConfigFile::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse_config_file(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded configuration from file");
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classifier.validate()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
