//! Shared LLM client and completion provider abstraction
//!
//! The classification pipeline only needs "send a request, get text back"; the
//! [`CompletionProvider`] trait is that boundary.

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

use crate::model::{ClassifierConfig, ProviderKind};
use crate::service::keyword::KeywordClassifier;

/// API key environment variables per provider
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_GROQ_API_KEY: &str = "GROQ_API_KEY";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_GROQ_MODEL: &str = "llama3-8b-8192";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

/// Outbound request produced by the prompt formatter
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// System prompt
    pub preamble: String,
    /// Rendered user prompt, including any retry clarification
    pub prompt: String,
    /// The ticket message the prompt was rendered from
    pub message: String,
    pub template_version: String,
}

/// A backend that turns a request into raw reply text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// `<provider>/<model>`, used to build `model_version`
    fn descriptor(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> Result<String, ProviderError>;
}

/// Shared LLM client wrapper for OpenAI-compatible chat-completion endpoints
#[derive(Clone)]
pub struct LlmClient {
    client: openai::CompletionsClient,
    model: String,
    temperature: f64,
    max_tokens: u64,
    descriptor: String,
}

impl LlmClient {
    /// Create a new LLM client for the given endpoint
    pub fn new(
        provider: ProviderKind,
        api_key: &str,
        base_url: &str,
        model: &str,
        temperature: f64,
        max_tokens: u64,
    ) -> Result<Self, ProviderError> {
        let client = openai::CompletionsClient::builder()
            .api_key(api_key)
            .base_url(base_url)
            .build()
            .map_err(|e| {
                ProviderError::InvalidConfig(format!("Failed to create LLM client: {}", e))
            })?;

        Ok(Self {
            client,
            model: model.to_string(),
            temperature,
            max_tokens,
            descriptor: format!("{}/{}", provider.as_str(), model),
        })
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    fn descriptor(&self) -> &str {
        &self.descriptor
    }

    async fn complete(&self, request: &LlmRequest) -> Result<String, ProviderError> {
        tracing::debug!(
            model = %self.model,
            template_version = %request.template_version,
            prompt_length = request.prompt.len(),
            "Sending classification request"
        );

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&request.preamble)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build();

        agent
            .prompt(request.prompt.as_str())
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))
    }
}

/// Build the configured completion provider
pub fn build_provider(
    config: &ClassifierConfig,
) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    let provider: Arc<dyn CompletionProvider> = match config.provider {
        ProviderKind::Mock => Arc::new(KeywordClassifier::new()),
        ProviderKind::Openai => {
            let api_key = std::env::var(ENV_OPENAI_API_KEY)
                .map_err(|_| ProviderError::MissingConfig(ENV_OPENAI_API_KEY))?;
            Arc::new(LlmClient::new(
                ProviderKind::Openai,
                &api_key,
                config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
                config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
                config.temperature,
                config.max_tokens,
            )?)
        }
        ProviderKind::Groq => {
            let api_key = std::env::var(ENV_GROQ_API_KEY)
                .map_err(|_| ProviderError::MissingConfig(ENV_GROQ_API_KEY))?;
            Arc::new(LlmClient::new(
                ProviderKind::Groq,
                &api_key,
                config.base_url.as_deref().unwrap_or(GROQ_BASE_URL),
                config.model.as_deref().unwrap_or(DEFAULT_GROQ_MODEL),
                config.temperature,
                config.max_tokens,
            )?)
        }
    };

    tracing::info!(
        provider = %provider.descriptor(),
        "Completion provider initialized"
    );

    Ok(provider)
}
