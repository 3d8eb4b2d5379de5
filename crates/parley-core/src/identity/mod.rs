//! Identity provider port and the session binding built on it.

pub mod binding;
pub mod provider;
