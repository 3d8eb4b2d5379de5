//! Infrastructure layer for Parley.
//!
//! Contains implementations of the traits defined in `parley-core`: SQLite
//! storage (key-value store, conversations), the local identity provider, the
//! OpenAI-compatible completion client, API key resolution (environment and
//! OS keychain), and configuration loading.

pub mod config;
pub mod credentials;
pub mod crypto;
pub mod identity;
pub mod keychain;
pub mod llm;
pub mod sqlite;
