//! Configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `config.toml` that controls the
//! completion endpoint and chat limits. Every field has a default, so an empty
//! file (or no file at all) yields a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Parley client.
///
/// Loaded from `~/.parley/config.toml`. All sections are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

/// Settings for the OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens in a single response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Leading system instruction prepended to every request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Transport-level deadline for one completion request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant that provides clear, accurate, and concise responses."
        .to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Limits and storage settings for chat sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Longest accepted message, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Key under which the local transcript is stored.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

fn default_max_message_length() -> usize {
    4000
}

fn default_storage_key() -> String {
    "chat-storage".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
            storage_key: default_storage_key(),
        }
    }
}
