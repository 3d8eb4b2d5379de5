//! Conversation service for signed-in users.
//!
//! ConversationService wraps a ConversationRepository with ownership checks:
//! a user only ever sees, opens, or deletes their own conversations.

use parley_types::chat::{Conversation, Message, PersistedMessage};
use parley_types::error::ChatError;
use parley_types::identity::Identity;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::repository::ConversationRepository;
use crate::chat::store::ConversationTranscriptStore;

/// Orchestrates the conversation lifecycle for one repository.
///
/// Generic over `ConversationRepository` to maintain clean architecture
/// (parley-core never depends on parley-infra).
pub struct ConversationService<R: ConversationRepository> {
    repo: R,
}

impl<R: ConversationRepository> ConversationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Access the conversation repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Create an untitled conversation owned by `user`.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_conversation(&self, user: &Identity) -> Result<Conversation, ChatError> {
        let conversation = self
            .repo
            .create_conversation(&Conversation::new(user.id))
            .await?;
        info!(chat_id = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    /// List the user's conversations, most recently updated first.
    pub async fn list_conversations(
        &self,
        user: &Identity,
    ) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.repo.list_conversations(&user.id).await?)
    }

    /// Fetch a conversation the user owns.
    ///
    /// Someone else's conversation is reported as `NotFound`.
    pub async fn open_conversation(
        &self,
        user: &Identity,
        id: &Uuid,
    ) -> Result<Conversation, ChatError> {
        match self.repo.get_conversation(id).await? {
            Some(conversation) if conversation.user_id == user.id => Ok(conversation),
            Some(_) => {
                warn!(chat_id = %id, user_id = %user.id, "Refused access to another user's conversation");
                Err(ChatError::NotFound)
            }
            None => Err(ChatError::NotFound),
        }
    }

    /// Messages of a conversation the user owns, oldest first.
    pub async fn messages(&self, user: &Identity, id: &Uuid) -> Result<Vec<Message>, ChatError> {
        let conversation = self.open_conversation(user, id).await?;
        Ok(self.repo.list_messages(&conversation.id).await?)
    }

    /// Delete a conversation the user owns, along with its messages.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete_conversation(&self, user: &Identity, id: &Uuid) -> Result<(), ChatError> {
        let conversation = self.open_conversation(user, id).await?;
        self.repo.delete_conversation(&conversation.id).await?;
        info!(chat_id = %id, "Conversation deleted");
        Ok(())
    }

    /// Receive message rows as they are inserted into one conversation.
    pub fn watch(&self, chat_id: Uuid) -> ConversationFeed {
        ConversationFeed {
            chat_id,
            rx: self.repo.subscribe(),
        }
    }
}

impl<R: ConversationRepository + Clone> ConversationService<R> {
    /// A transcript store bound to `conversation`.
    pub fn transcript_store(&self, conversation: &Conversation) -> ConversationTranscriptStore<R> {
        ConversationTranscriptStore::new(self.repo.clone(), conversation.id)
    }
}

/// Change feed filtered to a single conversation.
pub struct ConversationFeed {
    chat_id: Uuid,
    rx: broadcast::Receiver<PersistedMessage>,
}

impl ConversationFeed {
    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }

    /// Next message inserted into this conversation.
    ///
    /// Returns `None` once the repository has been dropped. Messages missed
    /// because the receiver lagged are skipped.
    pub async fn next(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(row) if row.chat_id == self.chat_id => return Some(row.message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, chat_id = %self.chat_id, "Conversation feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
