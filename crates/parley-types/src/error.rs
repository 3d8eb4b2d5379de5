use thiserror::Error;

/// User-facing text for a missing API key.
pub const API_KEY_MISSING: &str = "API key is missing. Please check your settings.";

/// User-facing text for an empty message.
pub const MESSAGE_EMPTY: &str = "Message cannot be empty";

/// Errors surfaced by chat operations.
///
/// The `Display` text of each variant is what the session manager shows the
/// user, so remote messages are rendered verbatim.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("Network error occurred. Please check your connection. ({0})")]
    Transport(String),

    #[error("Unexpected response from the completion API: {0}")]
    MalformedResponse(String),

    #[error("storage error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("you must be signed in to do that")]
    Unauthenticated,

    #[error("conversation not found")]
    NotFound,
}

impl ChatError {
    /// Build a remote error, falling back to a generic message when the
    /// response carried no structured error body.
    pub fn remote(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("API error: {status}"));
        ChatError::Remote { status, message }
    }
}

/// Errors from transcript persistence.
///
/// Persistence is best-effort: the session manager logs these and carries on.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("invalid stored transcript: {0}")]
    Deserialization(String),

    #[error("failed to encode transcript: {0}")]
    Serialization(String),
}

impl From<RepositoryError> for PersistenceError {
    fn from(err: RepositoryError) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for ChatError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ChatError::NotFound,
            other => ChatError::Persistence(other.into()),
        }
    }
}

/// Errors from identity provider operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account already exists for '{0}'")]
    EmailTaken(String),

    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("sign-in with {0} is not available")]
    UnsupportedProvider(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        AuthError::Storage(err.to_string())
    }
}
