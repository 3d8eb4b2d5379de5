//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `parley-core` using sqlx with split
//! read/write pools, private Row structs, and a broadcast change feed that
//! carries every newly inserted message row.

use std::collections::HashSet;

use parley_core::chat::repository::ConversationRepository;
use parley_types::chat::{Conversation, Message, MessageRole, PersistedMessage};
use parley_types::error::RepositoryError;
use sqlx::Row;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::pool::{DatabasePool, format_datetime, parse_datetime, query_error};

/// Capacity of the inserted-message change feed.
const FEED_CAPACITY: usize = 256;

/// SQLite-backed implementation of `ConversationRepository`.
///
/// Clones share the pool and the change feed.
#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: DatabasePool,
    feed: broadcast::Sender<PersistedMessage>,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self { pool, feed }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    title: Option<String>,
    user_id: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid chat id: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| RepositoryError::Query(format!("invalid user_id: {e}")))?;

        Ok(Conversation {
            id,
            title: self.title,
            user_id,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    role: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Message {
            id,
            content: self.content,
            role,
            timestamp: parse_datetime(&self.created_at)?.timestamp_millis(),
        })
    }
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<Conversation, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chats (id, title, user_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.title)
        .bind(conversation.user_id.to_string())
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "chat {} already exists",
                        conversation.id
                    ));
                }
            }
            query_error(e)
        })?;

        Ok(conversation.clone())
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row).map_err(query_error)?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn list_conversations(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chats WHERE user_id = ? ORDER BY updated_at DESC, rowid DESC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                ConversationRow::from_row(row)
                    .map_err(query_error)?
                    .into_conversation()
            })
            .collect()
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
            .bind(&conversation.title)
            .bind(format_datetime(&conversation.updated_at))
            .bind(conversation.id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: &Uuid) -> Result<(), RepositoryError> {
        // Messages go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_messages(&self, chat_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| MessageRow::from_row(row).map_err(query_error)?.into_message())
            .collect()
    }

    async fn replace_messages(
        &self,
        chat_id: &Uuid,
        messages: &[Message],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let existing: HashSet<String> = sqlx::query("SELECT id FROM messages WHERE chat_id = ?")
            .bind(chat_id.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(query_error)?
            .iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<Result<_, _>>()
            .map_err(query_error)?;

        let wanted: HashSet<String> = messages.iter().map(|m| m.id.to_string()).collect();

        for stale in existing.difference(&wanted) {
            sqlx::query("DELETE FROM messages WHERE id = ?")
                .bind(stale)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
        }

        let mut inserted = Vec::new();
        for message in messages {
            let id = message.id.to_string();
            if existing.contains(&id) {
                continue;
            }
            sqlx::query(
                r#"INSERT INTO messages (id, chat_id, role, content, created_at)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(chat_id.to_string())
            .bind(message.role.to_string())
            .bind(&message.content)
            .bind(format_datetime(&message.created_at()))
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
            inserted.push(message.clone());
        }

        tx.commit().await.map_err(query_error)?;

        debug!(
            chat_id = %chat_id,
            inserted = inserted.len(),
            removed = existing.difference(&wanted).count(),
            "Messages synchronized"
        );

        for message in inserted {
            // No subscribers is fine.
            let _ = self.feed.send(PersistedMessage {
                chat_id: *chat_id,
                message,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PersistedMessage> {
        self.feed.subscribe()
    }
}
