//! ConversationRepository trait definition.
//!
//! Provides CRUD operations for conversations and their messages, plus a
//! change feed of newly inserted message rows.

use parley_types::chat::{Conversation, Message, PersistedMessage};
use parley_types::error::RepositoryError;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Repository trait for conversation and message persistence.
///
/// Implementations live in parley-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ConversationRepository: Send + Sync {
    /// Create a new conversation.
    fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by its unique ID.
    fn get_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List a user's conversations, ordered by updated_at DESC.
    fn list_conversations(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Update title and updated_at of an existing conversation.
    fn update_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a conversation and its messages.
    fn delete_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get the messages of a conversation, ordered by created_at ASC.
    fn list_messages(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Make the stored messages of a conversation equal to `messages`.
    ///
    /// Rows not in `messages` are deleted and new ones inserted, atomically.
    /// Each inserted row is published on the change feed.
    fn replace_messages(
        &self,
        chat_id: &Uuid,
        messages: &[Message],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Subscribe to newly inserted message rows across all conversations.
    fn subscribe(&self) -> broadcast::Receiver<PersistedMessage>;
}
