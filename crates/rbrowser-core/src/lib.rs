//! Core types, config, errors, and the browser wire protocol for rbrowser.

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;
