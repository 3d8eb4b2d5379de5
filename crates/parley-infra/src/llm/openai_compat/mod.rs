//! OpenAiCompatClient -- concrete [`CompletionClient`] for any endpoint that
//! speaks the OpenAI Chat Completions protocol.
//!
//! Sends a single non-streaming `POST {base_url}/chat/completions` per call.
//! The API key is wrapped in [`secrecy::SecretString`] and is only exposed when
//! building the `Authorization` header.

pub mod config;
pub mod types;

use secrecy::{ExposeSecret, SecretString};
use tracing::{Instrument, debug, field, info_span};

use parley_core::llm::client::CompletionClient;
use parley_observe::genai_attrs::{
    GEN_AI_RESPONSE_FINISH_REASONS, GEN_AI_RESPONSE_ID, GEN_AI_RESPONSE_MODEL,
    GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS, OP_CHAT,
};
use parley_types::chat::{Message, MessageRole};
use parley_types::error::{API_KEY_MISSING, ChatError};
use parley_types::identity::Identity;

use self::config::OpenAiCompatConfig;
use self::types::{ChatCompletionRequest, ChatCompletionResponse, ErrorEnvelope, RequestMessage};

/// OpenAI-compatible chat-completion client.
///
/// Holds no mutable state; one instance can serve any number of sessions.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    /// Create a client. Fails only if the HTTP client cannot be built.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChatError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn api_key(&self) -> Result<&SecretString, ChatError> {
        self.config
            .api_key
            .as_ref()
            .ok_or_else(|| ChatError::Configuration(API_KEY_MISSING.to_string()))
    }

    /// System prompt first, then the transcript in order.
    fn build_request<'a>(
        &'a self,
        transcript: &'a [Message],
        identity: Option<&Identity>,
    ) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(RequestMessage {
            role: MessageRole::System,
            content: &self.config.system_prompt,
        });
        messages.extend(transcript.iter().map(|m| RequestMessage {
            role: m.role,
            content: &m.content,
        }));

        ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            user: identity.map(|i| i.id.to_string()),
        }
    }

    async fn send_request(
        &self,
        api_key: &SecretString,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<String, ChatError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Completion endpoint returned an error");
            return Err(ChatError::remote(
                status.as_u16(),
                ErrorEnvelope::message_from(&text),
            ));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ChatError::MalformedResponse(format!("failed to parse response: {e}")))?;
        extract_reply(parsed)
    }
}

/// Pull `choices[0].message.content` out of a response, recording GenAI
/// attributes on the current span.
fn extract_reply(response: ChatCompletionResponse) -> Result<String, ChatError> {
    let span = tracing::Span::current();
    if let Some(id) = &response.id {
        span.record(GEN_AI_RESPONSE_ID, id.as_str());
    }
    if let Some(model) = &response.model {
        span.record(GEN_AI_RESPONSE_MODEL, model.as_str());
    }
    if let Some(usage) = &response.usage {
        if let Some(input) = usage.prompt_tokens {
            span.record(GEN_AI_USAGE_INPUT_TOKENS, input);
        }
        if let Some(output) = usage.completion_tokens {
            span.record(GEN_AI_USAGE_OUTPUT_TOKENS, output);
        }
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::MalformedResponse("response contained no choices".to_string()))?;
    if let Some(reason) = &choice.finish_reason {
        span.record(GEN_AI_RESPONSE_FINISH_REASONS, reason.as_str());
    }

    choice
        .message
        .and_then(|m| m.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ChatError::MalformedResponse("response message had no content".to_string()))
}

impl CompletionClient for OpenAiCompatClient {
    fn check_ready(&self) -> Result<(), ChatError> {
        self.api_key().map(|_| ())
    }

    async fn complete(
        &self,
        transcript: &[Message],
        identity: Option<&Identity>,
    ) -> Result<String, ChatError> {
        let api_key = self.api_key()?;
        let body = self.build_request(transcript, identity);

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.operation.name = OP_CHAT,
            gen_ai.provider.name = %self.config.provider_name,
            gen_ai.request.model = %self.config.model,
            gen_ai.request.max_tokens = self.config.max_tokens,
            gen_ai.request.temperature = self.config.temperature,
            gen_ai.response.id = field::Empty,
            gen_ai.response.model = field::Empty,
            gen_ai.response.finish_reasons = field::Empty,
            gen_ai.usage.input_tokens = field::Empty,
            gen_ai.usage.output_tokens = field::Empty,
            messages = body.messages.len(),
        );

        self.send_request(api_key, &body).instrument(span).await
    }
}
