//! Shared domain types for Parley.
//!
//! This crate contains the core domain types used across the Parley chat client:
//! messages, conversations, session state, identities, configuration, and their
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
