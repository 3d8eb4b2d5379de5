//! Identity provider implementations.

pub mod local;
