//! Completion client abstraction for Parley.
//!
//! - `CompletionClient`: RPITIT trait for chat-completion backends

pub mod client;
