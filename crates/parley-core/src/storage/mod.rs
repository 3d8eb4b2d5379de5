//! Storage abstractions for Parley.
//!
//! Defines the namespaced key-value store trait and the transcript store
//! contract the session manager persists through.

pub mod kv_store;
pub mod transcript;
