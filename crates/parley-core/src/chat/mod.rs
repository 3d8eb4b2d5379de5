//! Chat sessions and conversation persistence for Parley.
//!
//! - `SessionManager`: owns one session's transcript and send/retry/clear
//! - `ConversationRepository`: port for conversation and message rows
//! - `ConversationService`: user-scoped conversation lifecycle
//! - `ConversationTranscriptStore`: transcript store bound to one conversation

pub mod repository;
pub mod service;
pub mod session;
pub mod store;
