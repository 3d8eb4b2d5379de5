//! Completion client implementations.
//!
//! Contains the OpenAI-compatible implementation of the [`CompletionClient`]
//! trait defined in `parley-core`, plus [`create_client`], which builds it from
//! configuration and the API key chain.
//!
//! [`CompletionClient`]: parley_core::llm::client::CompletionClient

pub mod openai_compat;

use parley_types::config::CompletionConfig;
use parley_types::error::ChatError;

use crate::credentials::ApiKeyChain;

use self::openai_compat::OpenAiCompatClient;
use self::openai_compat::config::OpenAiCompatConfig;

/// Create the completion client described by `config`.
///
/// The API key comes from the first source in `keys` that holds one. A
/// missing key is not an error here: the client reports it through
/// `check_ready` so the chat session can show it.
pub fn create_client(
    config: &CompletionConfig,
    keys: &ApiKeyChain,
) -> Result<OpenAiCompatClient, ChatError> {
    let api_key = keys.resolve().map(|resolved| resolved.key);
    if api_key.is_none() {
        tracing::debug!(var = %config.api_key_env, "No API key in environment or keychain");
    }
    OpenAiCompatClient::new(OpenAiCompatConfig::from_completion_config(config, api_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{EnvKeySource, KeySource};
    use parley_core::llm::client::CompletionClient;
    use std::sync::Arc;

    #[test]
    fn test_create_client_without_key_is_not_ready() {
        let config = CompletionConfig {
            api_key_env: "PARLEY_TEST_MISSING_KEY_VAR_987".to_string(),
            ..Default::default()
        };
        let keys = ApiKeyChain::new(vec![
            Arc::new(EnvKeySource::new(&config.api_key_env)) as Arc<dyn KeySource>
        ]);
        let client = create_client(&config, &keys).unwrap();
        let err = client.check_ready().unwrap_err();
        assert!(matches!(err, ChatError::Configuration(_)));
    }
}
