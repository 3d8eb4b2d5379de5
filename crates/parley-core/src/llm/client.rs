//! CompletionClient trait definition.
//!
//! The session manager talks to the hosted model only through this trait.
//! Implementations live in parley-infra (e.g., `OpenAiCompatClient`).

use parley_types::chat::Message;
use parley_types::error::ChatError;
use parley_types::identity::Identity;

/// Trait for chat-completion backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait CompletionClient: Send + Sync {
    /// Check that the client is usable (e.g., an API key is configured).
    ///
    /// Fails with `ChatError::Configuration` without any network traffic.
    fn check_ready(&self) -> Result<(), ChatError>;

    /// Request a single completion for `transcript`.
    ///
    /// The transcript already ends with the new user message. Returns the
    /// assistant reply text.
    fn complete(
        &self,
        transcript: &[Message],
        identity: Option<&Identity>,
    ) -> impl std::future::Future<Output = Result<String, ChatError>> + Send;
}
