//! Business logic and port trait definitions for Parley.
//!
//! This crate defines the "ports" (completion client, transcript and
//! key-value stores, conversation repository, identity provider) that the
//! infrastructure layer implements, plus the chat session manager built on top
//! of them. It depends only on `parley-types` -- never on `parley-infra` or any
//! database/IO crate.

pub mod chat;
pub mod identity;
pub mod llm;
pub mod storage;
