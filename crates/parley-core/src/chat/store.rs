//! Transcript store backed by a conversation's message rows.

use chrono::Utc;
use parley_types::chat::{Message, title_for_transcript};
use parley_types::error::PersistenceError;
use tracing::debug;
use uuid::Uuid;

use crate::chat::repository::ConversationRepository;
use crate::storage::transcript::TranscriptStore;

/// [`TranscriptStore`] bound to one conversation in a [`ConversationRepository`].
///
/// Saving synchronizes the message rows, names an untitled conversation after
/// its first user message, and touches `updated_at`.
pub struct ConversationTranscriptStore<R: ConversationRepository> {
    repo: R,
    chat_id: Uuid,
}

impl<R: ConversationRepository> ConversationTranscriptStore<R> {
    pub fn new(repo: R, chat_id: Uuid) -> Self {
        Self { repo, chat_id }
    }

    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }
}

impl<R: ConversationRepository> TranscriptStore for ConversationTranscriptStore<R> {
    async fn load(&self) -> Result<Vec<Message>, PersistenceError> {
        Ok(self.repo.list_messages(&self.chat_id).await?)
    }

    async fn save(&self, transcript: &[Message]) -> Result<(), PersistenceError> {
        self.repo.replace_messages(&self.chat_id, transcript).await?;

        let Some(mut conversation) = self.repo.get_conversation(&self.chat_id).await? else {
            return Err(PersistenceError::Storage(format!(
                "conversation {} no longer exists",
                self.chat_id
            )));
        };
        if conversation.title.is_none() {
            conversation.title = title_for_transcript(transcript);
            if let Some(title) = &conversation.title {
                debug!(chat_id = %self.chat_id, title = %title, "Conversation titled");
            }
        }
        conversation.updated_at = Utc::now();
        self.repo.update_conversation(&conversation).await?;
        Ok(())
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.chat_id.to_string())
    }
}
