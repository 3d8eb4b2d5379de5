//! Configuration for the OpenAI-compatible completion client.

use std::time::Duration;

use parley_observe::genai_attrs::PROVIDER_OPENAI;
use parley_types::config::CompletionConfig;
use secrecy::SecretString;

/// Everything the client needs to build a request.
///
/// Used to construct an [`super::OpenAiCompatClient`].
pub struct OpenAiCompatConfig {
    /// Provider name recorded on spans (e.g., "openai").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    /// API key for authentication. `None` makes the client not ready.
    pub api_key: Option<SecretString>,
    /// Model identifier (e.g., "gpt-4o").
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Leading system instruction.
    pub system_prompt: String,
    pub request_timeout: Duration,
}

impl OpenAiCompatConfig {
    /// Build from the `[completion]` config section and a resolved key.
    pub fn from_completion_config(config: &CompletionConfig, api_key: Option<SecretString>) -> Self {
        Self {
            provider_name: PROVIDER_OPENAI.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}
