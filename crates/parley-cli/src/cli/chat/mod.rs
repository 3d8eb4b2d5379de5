//! Interactive CLI chat experience for Parley.
//!
//! This module implements the chat loop: a thinking spinner while the
//! completion is outstanding, markdown rendering of replies, a welcome banner,
//! and slash commands. Entry point: `loop_runner::run_chat`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
