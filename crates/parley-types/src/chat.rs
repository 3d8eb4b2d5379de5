//! Message, conversation, and session state types for Parley.
//!
//! These types model a chat between a user and a hosted language model:
//! the individual messages, the conversation record that groups them, and the
//! observable state of an active chat session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Number of characters of the first user message kept in a derived title.
pub const TITLE_MAX_CHARS: usize = 30;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in a transcript.
///
/// Messages are immutable once created. `timestamp` is milliseconds since the
/// Unix epoch; transcripts are ordered by creation, not by timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub role: MessageRole,
    pub timestamp: i64,
}

impl Message {
    /// Create a message stamped with a fresh UUIDv7 and the current time.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            content: content.into(),
            role,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Creation time as a UTC datetime.
    ///
    /// Falls back to the Unix epoch if the stored timestamp is out of range.
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }
}

/// A conversation record owned by a single user.
///
/// `title` stays `None` until the first user message is persisted; it is then
/// derived with [`derive_title`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an untitled conversation for a user.
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: None,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Title for display, with a placeholder for untitled conversations.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("New Chat")
    }
}

/// Observable state of a chat session.
///
/// Invariants maintained by the session manager:
/// - `is_loading` implies exactly one completion request is outstanding.
/// - `error.is_some()` implies `!is_loading`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub transcript: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub active_conversation_id: Option<String>,
}

impl SessionState {
    /// The most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.transcript
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }
}

/// A message row that was newly inserted into a conversation.
///
/// Published on the conversation repository's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub chat_id: Uuid,
    pub message: Message,
}

/// Derive a conversation title from the first user message.
///
/// Keeps the first [`TITLE_MAX_CHARS`] characters of the trimmed text and
/// appends `...` when anything was cut. Never splits a character.
pub fn derive_title(first_user_message: &str) -> String {
    let text = first_user_message.trim();
    let mut chars = text.char_indices();
    match chars.nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Derive a title from the first user message of a transcript, if there is one.
pub fn title_for_transcript(transcript: &[Message]) -> Option<String> {
    transcript
        .iter()
        .find(|m| m.role == MessageRole::User)
        .map(|m| derive_title(&m.content))
}
